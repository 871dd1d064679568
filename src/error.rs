use crate::backend::EngineError;
use crate::config::ConfigError;
use crate::model::VersionError;
use crate::queue::QueueError;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Top-level crate error, aggregating the component error kinds
/// (`ConfigError`, `NotFound`, `ValidationError`, `BackendError`, `StateError`,
/// `IOError`, `QueueError`) behind a single `kind`, in the
/// `{Component}Error{kind}` shape this crate's lineage uses throughout.
#[derive(Debug)]
pub struct BfmError {
    pub kind: BfmErrorKind,
}

impl fmt::Display for BfmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BfmError: {}", self.kind)
    }
}

impl Error for BfmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug)]
pub enum BfmErrorKind {
    /// Missing required env var; malformed connection declaration. Fatal at startup.
    Config(ConfigError),
    /// Migration id / connection name / backend / dependency target unknown.
    NotFound(String),
    /// Precondition failed: dep unapplied, schema/table missing, cycle, missing dep target.
    Validation(Vec<String>),
    /// connect/execute/health probe failed against a backend.
    Backend(EngineError),
    /// Recording or reading the meta-DB failed.
    State(sqlx::Error),
    /// Filesystem error during load/watch/reindex.
    Io { source: std::io::Error, path: PathBuf },
    /// Publish or consume on the queue failed.
    Queue(QueueError),
    Version(VersionError),
}

impl fmt::Display for BfmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Validation(errors) => write!(f, "validation failed: {}", errors.join("; ")),
            Self::Backend(e) => write!(f, "{e}"),
            Self::State(e) => write!(f, "state tracker error: {e}"),
            Self::Io { path, .. } => write!(f, "I/O error at '{path:?}'"),
            Self::Queue(e) => write!(f, "{e}"),
            Self::Version(e) => write!(f, "{e}"),
        }
    }
}

impl Error for BfmErrorKind {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Backend(e) => Some(e),
            Self::State(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            Self::Queue(e) => Some(e),
            Self::Version(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for BfmError {
    fn from(e: ConfigError) -> Self {
        BfmError { kind: BfmErrorKind::Config(e) }
    }
}

impl From<EngineError> for BfmError {
    fn from(e: EngineError) -> Self {
        BfmError { kind: BfmErrorKind::Backend(e) }
    }
}

impl From<QueueError> for BfmError {
    fn from(e: QueueError) -> Self {
        BfmError { kind: BfmErrorKind::Queue(e) }
    }
}

impl From<VersionError> for BfmError {
    fn from(e: VersionError) -> Self {
        BfmError { kind: BfmErrorKind::Version(e) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_with_identifier() {
        let err = BfmError { kind: BfmErrorKind::NotFound("connection 'guard'".into()) };
        assert!(err.to_string().contains("guard"));
    }

    #[test]
    fn validation_joins_all_errors() {
        let err = BfmError {
            kind: BfmErrorKind::Validation(vec!["cycle: a -> b -> a".into(), "missing table".into()]),
        };
        let text = err.to_string();
        assert!(text.contains("cycle"));
        assert!(text.contains("missing table"));
    }
}
