use crate::model::{ExecutionRecord, ExecutionStatus, HistoryFilter, ScannedMigration};
use std::collections::HashMap;
use std::sync::Mutex;

/// No-I/O state tracker used by executor/reindexer tests.
#[derive(Default)]
pub struct MemoryStateTracker {
    history: Mutex<Vec<ExecutionRecord>>,
    scanned: Mutex<HashMap<String, ScannedMigration>>,
}

impl MemoryStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    pub async fn record(&self, record: &ExecutionRecord) -> Result<(), sqlx::Error> {
        self.history.lock().expect("lock poisoned").push(record.clone());
        Ok(())
    }

    pub async fn is_applied(&self, migration_id: &str) -> Result<bool, sqlx::Error> {
        Ok(self
            .history
            .lock()
            .expect("lock poisoned")
            .iter()
            .rev()
            .find(|r| r.migration_id == migration_id)
            .map(|r| r.status == ExecutionStatus::Success)
            .unwrap_or(false))
    }

    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionRecord>, sqlx::Error> {
        let mut records: Vec<ExecutionRecord> = self
            .history
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|r| filter.matches_record(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(records)
    }

    pub async fn list(&self, filter: &HistoryFilter) -> Result<Vec<ScannedMigration>, sqlx::Error> {
        Ok(self
            .scanned
            .lock()
            .expect("lock poisoned")
            .values()
            .filter(|s| filter.matches_scanned(s))
            .cloned()
            .collect())
    }

    pub async fn last_version(&self, schema: &str, table: &str) -> Result<Option<String>, sqlx::Error> {
        let table = if table.is_empty() { None } else { Some(table) };
        Ok(self
            .history
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|r| r.status == ExecutionStatus::Success && r.schema == schema && r.table.as_deref() == table)
            .map(|r| r.version.clone())
            .max())
    }

    pub async fn register_scanned(&self, scanned: &ScannedMigration) -> Result<(), sqlx::Error> {
        self.scanned
            .lock()
            .expect("lock poisoned")
            .insert(scanned.migration_id.clone(), scanned.clone());
        Ok(())
    }

    pub async fn update_info(&self, scanned: &ScannedMigration) -> Result<(), sqlx::Error> {
        self.register_scanned(scanned).await
    }

    pub async fn delete(&self, migration_id: &str) -> Result<(), sqlx::Error> {
        self.scanned.lock().expect("lock poisoned").remove(migration_id);
        Ok(())
    }
}
