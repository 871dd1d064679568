use std::fmt;

/// One of the three storage engine families the catalog knows how to dispatch to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    /// Relational SQL store (PostgreSQL).
    Postgresql,
    /// Time-series HTTP-SQL store (GreptimeDB).
    Greptimedb,
    /// Hierarchical key-value store (etcd).
    Etcd,
}

impl Backend {
    /// The tag used in canonical migration ids, directory names, and
    /// `{CONN}_BACKEND` environment declarations.
    pub fn tag(&self) -> &'static str {
        match self {
            Backend::Postgresql => "postgresql",
            Backend::Greptimedb => "greptimedb",
            Backend::Etcd => "etcd",
        }
    }

    /// Payload file extension this backend expects (`.sql` unless the
    /// backend is document/key-value oriented, in which case `.json`).
    pub fn payload_extension(&self) -> &'static str {
        match self {
            Backend::Postgresql | Backend::Greptimedb => "sql",
            Backend::Etcd => "json",
        }
    }

    pub fn parse(tag: &str) -> Option<Backend> {
        match tag {
            "postgresql" => Some(Backend::Postgresql),
            "greptimedb" => Some(Backend::Greptimedb),
            "etcd" => Some(Backend::Etcd),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_tag() {
        for backend in [Backend::Postgresql, Backend::Greptimedb, Backend::Etcd] {
            assert_eq!(Backend::parse(backend.tag()), Some(backend));
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(Backend::parse("mongodb"), None);
    }

    #[test]
    fn json_payloads_for_kv_backend() {
        assert_eq!(Backend::Etcd.payload_extension(), "json");
        assert_eq!(Backend::Postgresql.payload_extension(), "sql");
    }
}
