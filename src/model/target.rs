use super::backend::Backend;

/// A filter selecting a subset of catalog migrations to consider for
/// execution. Any field left empty/`None` is not applied as a filter.
#[derive(Clone, Debug, Default)]
pub struct Target {
    pub backend: Option<Backend>,
    pub connection: Option<String>,
    pub schema: Option<String>,
    pub tables: Vec<String>,
    pub version: Option<String>,
}

impl Target {
    pub fn matches(&self, m: &super::migration::Migration) -> bool {
        if let Some(backend) = self.backend {
            if m.backend != backend {
                return false;
            }
        }
        if let Some(connection) = &self.connection {
            if &m.connection != connection {
                return false;
            }
        }
        if let Some(schema) = &self.schema {
            if &m.schema != schema {
                return false;
            }
        }
        if !self.tables.is_empty() {
            // A migration whose optional table is empty does not match a
            // non-empty tables filter.
            match &m.table {
                Some(table) if self.tables.iter().any(|t| t == table) => {}
                _ => return false,
            }
        }
        if let Some(version) = &self.version {
            if &m.version != version {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::backend::Backend;
    use crate::model::migration::Migration;

    fn sample(table: Option<&str>) -> Migration {
        Migration {
            version: "20240101120000".into(),
            name: "m".into(),
            backend: Backend::Postgresql,
            connection: "core".into(),
            schema: "public".into(),
            table: table.map(|t| t.to_string()),
            up_payload: vec![],
            down_payload: None,
            dependencies: vec![],
            structured_dependencies: vec![],
        }
    }

    #[test]
    fn empty_target_matches_everything() {
        let target = Target::default();
        assert!(target.matches(&sample(Some("users"))));
        assert!(target.matches(&sample(None)));
    }

    #[test]
    fn table_filter_excludes_tableless_migrations() {
        let target = Target {
            tables: vec!["users".into()],
            ..Target::default()
        };
        assert!(target.matches(&sample(Some("users"))));
        assert!(!target.matches(&sample(None)));
        assert!(!target.matches(&sample(Some("orders"))));
    }

    #[test]
    fn combines_backend_and_connection_filters() {
        let target = Target {
            backend: Some(Backend::Postgresql),
            connection: Some("core".into()),
            ..Target::default()
        };
        assert!(target.matches(&sample(None)));

        let target_wrong_conn = Target {
            connection: Some("guard".into()),
            ..Target::default()
        };
        assert!(!target_wrong_conn.matches(&sample(None)));
    }
}
