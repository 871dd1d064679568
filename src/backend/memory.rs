use super::error::EngineError;
use crate::model::Migration;
use std::collections::HashSet;
use std::sync::Mutex;

/// No-I/O stand-in for a real backend, used by executor and resolver tests
/// so they don't need a live Postgres/GreptimeDB/etcd instance. Tracks which
/// schemas/tables have been "created" and which migrations have been "run"
/// purely in memory.
#[derive(Default)]
pub struct MemoryEngine {
    schemas: Mutex<HashSet<String>>,
    tables: Mutex<HashSet<(String, String)>>,
    pub executed: Mutex<Vec<String>>,
    pub fail_next: Mutex<bool>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> Result<(), EngineError> {
        Ok(())
    }

    pub async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }

    pub async fn create_schema(&self, name: &str) -> Result<(), EngineError> {
        self.schemas.lock().expect("lock poisoned").insert(name.to_string());
        Ok(())
    }

    pub async fn schema_exists(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self.schemas.lock().expect("lock poisoned").contains(name))
    }

    pub async fn table_exists(&self, schema: &str, name: &str) -> Result<bool, EngineError> {
        Ok(self
            .tables
            .lock()
            .expect("lock poisoned")
            .contains(&(schema.to_string(), name.to_string())))
    }

    pub fn declare_table(&self, schema: &str, table: &str) {
        self.tables
            .lock()
            .expect("lock poisoned")
            .insert((schema.to_string(), table.to_string()));
    }

    pub async fn execute(&self, migration: &Migration, schema: &str, _payload: &[u8]) -> Result<(), EngineError> {
        let mut fail_next = self.fail_next.lock().expect("lock poisoned");
        if *fail_next {
            *fail_next = false;
            return Err(EngineError {
                kind: super::error::EngineErrorKind::ConnectionNotOpen,
            });
        }
        drop(fail_next);

        if !schema.is_empty() {
            self.create_schema(schema).await?;
        }
        if let Some(table) = &migration.table {
            self.declare_table(schema, table);
        }
        self.executed.lock().expect("lock poisoned").push(migration.canonical_id());
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Backend;

    fn migration() -> Migration {
        Migration {
            version: "20240101120000".into(),
            name: "create_users".into(),
            backend: Backend::Postgresql,
            connection: "core".into(),
            schema: "public".into(),
            table: Some("users".into()),
            up_payload: vec![],
            down_payload: None,
            dependencies: vec![],
            structured_dependencies: vec![],
        }
    }

    #[tokio::test]
    async fn execute_records_canonical_id_and_declares_table() {
        let engine = MemoryEngine::new();
        let m = migration();
        engine.execute(&m, "public", b"noop").await.unwrap();

        assert_eq!(engine.executed.lock().unwrap().as_slice(), &[m.canonical_id()]);
        assert!(engine.table_exists("public", "users").await.unwrap());
    }

    #[tokio::test]
    async fn fail_next_forces_a_single_error() {
        let engine = MemoryEngine::new();
        *engine.fail_next.lock().unwrap() = true;
        let m = migration();

        assert!(engine.execute(&m, "public", b"noop").await.is_err());
        assert!(engine.execute(&m, "public", b"noop").await.is_ok());
    }
}
