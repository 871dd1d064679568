pub mod memory;
pub mod tracker;

pub use memory::MemoryStateTracker;
pub use tracker::PostgresStateTracker;

use crate::model::{ExecutionRecord, HistoryFilter, ScannedMigration};

/// Enum dispatch over the state tracker implementations, mirroring
/// [`crate::backend::EngineBackend`]'s rationale: a fixed, small set of
/// variants avoids `dyn Trait` object-safety friction with async methods.
pub enum StateStore {
    Postgres(PostgresStateTracker),
    Memory(MemoryStateTracker),
}

impl StateStore {
    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.initialize().await,
            StateStore::Memory(s) => s.initialize().await,
        }
    }

    pub async fn record(&self, record: &ExecutionRecord) -> Result<(), sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.record(record).await,
            StateStore::Memory(s) => s.record(record).await,
        }
    }

    pub async fn is_applied(&self, migration_id: &str) -> Result<bool, sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.is_applied(migration_id).await,
            StateStore::Memory(s) => s.is_applied(migration_id).await,
        }
    }

    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionRecord>, sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.history(filter).await,
            StateStore::Memory(s) => s.history(filter).await,
        }
    }

    pub async fn list(&self, filter: &HistoryFilter) -> Result<Vec<ScannedMigration>, sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.list(filter).await,
            StateStore::Memory(s) => s.list(filter).await,
        }
    }

    pub async fn last_version(&self, schema: &str, table: &str) -> Result<Option<String>, sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.last_version(schema, table).await,
            StateStore::Memory(s) => s.last_version(schema, table).await,
        }
    }

    pub async fn register_scanned(&self, scanned: &ScannedMigration) -> Result<(), sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.register_scanned(scanned).await,
            StateStore::Memory(s) => s.register_scanned(scanned).await,
        }
    }

    pub async fn update_info(&self, scanned: &ScannedMigration) -> Result<(), sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.update_info(scanned).await,
            StateStore::Memory(s) => s.update_info(scanned).await,
        }
    }

    pub async fn delete(&self, migration_id: &str) -> Result<(), sqlx::Error> {
        match self {
            StateStore::Postgres(s) => s.delete(migration_id).await,
            StateStore::Memory(s) => s.delete(migration_id).await,
        }
    }
}
