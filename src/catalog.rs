use crate::model::{Backend, Migration, Target};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory registry of known migrations, keyed by canonical id.
///
/// Constructed explicitly at startup and passed into the Loader and Executor
/// rather than populated via import-time side effects.
/// Mutating and reading operations are safe under parallel access; a single
/// read-write lock is sufficient since no caller may hold it across I/O.
pub struct Catalog {
    inner: RwLock<HashMap<String, Migration>>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { inner: RwLock::new(HashMap::new()) }
    }

    /// Idempotent insert-or-replace: re-registering the same identity
    /// replaces silently (last write wins during a rescan).
    pub fn register(&self, migration: Migration) {
        let id = migration.canonical_id();
        self.inner.write().expect("catalog lock poisoned").insert(id, migration);
    }

    pub fn get(&self, canonical_id: &str) -> Option<Migration> {
        self.inner.read().expect("catalog lock poisoned").get(canonical_id).cloned()
    }

    pub fn remove(&self, canonical_id: &str) -> Option<Migration> {
        self.inner.write().expect("catalog lock poisoned").remove(canonical_id)
    }

    pub fn get_all(&self) -> Vec<Migration> {
        self.inner.read().expect("catalog lock poisoned").values().cloned().collect()
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.inner.read().expect("catalog lock poisoned").keys().cloned().collect()
    }

    /// Filter by any non-empty subset of `{backend, connection, schema, tables, version}`.
    pub fn find_by_target(&self, target: &Target) -> Vec<Migration> {
        self.inner
            .read()
            .expect("catalog lock poisoned")
            .values()
            .filter(|m| target.matches(m))
            .cloned()
            .collect()
    }

    pub fn by_connection(&self, connection: &str) -> Vec<Migration> {
        self.inner
            .read()
            .expect("catalog lock poisoned")
            .values()
            .filter(|m| m.connection == connection)
            .cloned()
            .collect()
    }

    pub fn by_backend(&self, backend: Backend) -> Vec<Migration> {
        self.inner
            .read()
            .expect("catalog lock poisoned")
            .values()
            .filter(|m| m.backend == backend)
            .cloned()
            .collect()
    }

    pub fn by_name(&self, name: &str) -> Vec<Migration> {
        self.inner
            .read()
            .expect("catalog lock poisoned")
            .values()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn by_version(&self, version: &str) -> Vec<Migration> {
        self.inner
            .read()
            .expect("catalog lock poisoned")
            .values()
            .filter(|m| m.version == version)
            .cloned()
            .collect()
    }

    pub fn by_connection_and_version(&self, connection: &str, version: &str) -> Vec<Migration> {
        self.inner
            .read()
            .expect("catalog lock poisoned")
            .values()
            .filter(|m| m.connection == connection && m.version == version)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: &str, name: &str, backend: Backend, connection: &str, table: Option<&str>) -> Migration {
        Migration {
            version: version.into(),
            name: name.into(),
            backend,
            connection: connection.into(),
            schema: String::new(),
            table: table.map(|t| t.to_string()),
            up_payload: vec![],
            down_payload: None,
            dependencies: vec![],
            structured_dependencies: vec![],
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let catalog = Catalog::new();
        let m = migration("20240101120000", "create_users", Backend::Postgresql, "core", Some("users"));
        let id = m.canonical_id();
        catalog.register(m);
        assert!(catalog.get(&id).is_some());
    }

    #[test]
    fn re_registering_same_identity_replaces_silently() {
        let catalog = Catalog::new();
        let mut m = migration("20240101120000", "create_users", Backend::Postgresql, "core", None);
        catalog.register(m.clone());
        m.table = Some("users".into());
        catalog.register(m.clone());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(&m.canonical_id()).unwrap().table, Some("users".to_string()));
    }

    #[test]
    fn find_by_target_filters_on_tableless_migrations() {
        let catalog = Catalog::new();
        catalog.register(migration("20240101120000", "a", Backend::Postgresql, "core", Some("users")));
        catalog.register(migration("20240101120001", "b", Backend::Postgresql, "core", None));

        let target = Target { tables: vec!["users".into()], ..Target::default() };
        let found = catalog.find_by_target(&target);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "a");
    }

    #[test]
    fn by_connection_and_version_intersects_filters() {
        let catalog = Catalog::new();
        catalog.register(migration("20240101120000", "a", Backend::Postgresql, "core", None));
        catalog.register(migration("20240101120000", "b", Backend::Postgresql, "guard", None));

        let found = catalog.by_connection_and_version("core", "20240101120000");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "a");
    }

    #[test]
    fn remove_deletes_entry() {
        let catalog = Catalog::new();
        let m = migration("20240101120000", "a", Backend::Postgresql, "core", None);
        let id = m.canonical_id();
        catalog.register(m);
        assert!(catalog.remove(&id).is_some());
        assert!(catalog.get(&id).is_none());
    }
}
