use std::error::Error;
use std::fmt;

/// connect/execute/health probe failures against a backend.
#[derive(Debug)]
pub struct EngineError {
    pub kind: EngineErrorKind,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineError: {}", self.kind)
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug)]
pub enum EngineErrorKind {
    Sqlx(sqlx::Error),
    Http(reqwest::Error),
    Etcd(etcd_client::Error),
    /// Payload was neither valid JSON nor a `key=value` line (KV adapter).
    InvalidKvPayload(String),
    /// A JSON payload parsed but was not the documented operation-array shape.
    MalformedKvOperations(String),
    /// GreptimeDB's `/v1/sql` endpoint returned a non-zero `code` or non-2xx status.
    SqlRequestFailed(String),
    ConnectionNotOpen,
    HealthCheckTimedOut,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlx(e) => write!(f, "sqlx error: {e}"),
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Etcd(e) => write!(f, "etcd error: {e}"),
            Self::InvalidKvPayload(p) => write!(f, "invalid KV payload: {p}"),
            Self::MalformedKvOperations(p) => write!(f, "malformed KV operation list: {p}"),
            Self::SqlRequestFailed(msg) => write!(f, "SQL request failed: {msg}"),
            Self::ConnectionNotOpen => write!(f, "backend connection is not open"),
            Self::HealthCheckTimedOut => write!(f, "health check exceeded its deadline"),
        }
    }
}

impl Error for EngineErrorKind {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlx(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Etcd(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError { kind: EngineErrorKind::Sqlx(e) }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError { kind: EngineErrorKind::Http(e) }
    }
}

impl From<etcd_client::Error> for EngineError {
    fn from(e: etcd_client::Error) -> Self {
        EngineError { kind: EngineErrorKind::Etcd(e) }
    }
}
