use super::backend::Backend;
use chrono::{DateTime, Utc};
use std::fmt;

/// Latest-status lifecycle of an [`ExecutionRecord`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
    RolledBack,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ExecutionStatus::Pending),
            "success" => Some(ExecutionStatus::Success),
            "failed" => Some(ExecutionStatus::Failed),
            "rolled_back" => Some(ExecutionStatus::RolledBack),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who/what triggered an execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionMethod {
    Api,
    Manual,
    Scheduled,
    Worker,
}

impl ExecutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMethod::Api => "api",
            ExecutionMethod::Manual => "manual",
            ExecutionMethod::Scheduled => "scheduled",
            ExecutionMethod::Worker => "worker",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "api" => Some(ExecutionMethod::Api),
            "manual" => Some(ExecutionMethod::Manual),
            "scheduled" => Some(ExecutionMethod::Scheduled),
            "worker" => Some(ExecutionMethod::Worker),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ExecutionMethod {
    fn default() -> Self {
        ExecutionMethod::Api
    }
}

/// Ambient request-scoped values the source threaded through a value bag;
/// modeled here as an explicit parameter object so
/// callers pass it directly into `execute*` instead of relying on
/// thread-local/request-scoped state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    pub executed_by: String,
    pub method: ExecutionMethod,
    pub context: String,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext {
            executed_by: "system".to_string(),
            method: ExecutionMethod::Api,
            context: String::new(),
        }
    }
}

/// Append-style execution history row: one row per attempt, keyed by
/// `(migration_id, applied_at)`. Current status is the latest row per
/// `migration_id`.
#[derive(Clone, Debug)]
pub struct ExecutionRecord {
    pub migration_id: String,
    pub schema: String,
    pub table: Option<String>,
    pub version: String,
    pub connection: String,
    pub backend: Backend,
    pub applied_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub executed_by: String,
    pub execution_method: ExecutionMethod,
    pub execution_context: String,
}

/// Denormalized row maintained by the Reindexer: one per known migration id,
/// carrying the same identifying metadata plus a last-known status summary.
/// Distinct from [`ExecutionRecord`] — the Reindexer never touches history.
#[derive(Clone, Debug)]
pub struct ScannedMigration {
    pub migration_id: String,
    pub version: String,
    pub name: String,
    pub backend: Backend,
    pub connection: String,
    pub schema: String,
    pub table: Option<String>,
    pub last_status: Option<ExecutionStatus>,
}

impl ScannedMigration {
    pub fn from_migration(m: &super::migration::Migration, last_status: Option<ExecutionStatus>) -> Self {
        ScannedMigration {
            migration_id: m.canonical_id(),
            version: m.version.clone(),
            name: m.name.clone(),
            backend: m.backend,
            connection: m.connection.clone(),
            schema: m.schema.clone(),
            table: m.table.clone(),
            last_status,
        }
    }

    /// True if any of the identifying metadata fields differ from `m`,
    /// which is the trigger condition for a Reindexer "Updated" event.
    pub fn differs_from(&self, m: &super::migration::Migration) -> bool {
        self.schema != m.schema
            || self.version != m.version
            || self.name != m.name
            || self.connection != m.connection
            || self.backend != m.backend
            || self.table != m.table
    }
}

/// Shared filter surface for [`ExecutionRecord`] history and [`ScannedMigration`]
/// listings: any field left `None` is not applied.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub migration_id: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub connection: Option<String>,
    pub backend: Option<Backend>,
    pub status: Option<ExecutionStatus>,
    pub version: Option<String>,
}

impl HistoryFilter {
    pub fn by_migration_id(migration_id: impl Into<String>) -> Self {
        HistoryFilter { migration_id: Some(migration_id.into()), ..Default::default() }
    }

    pub fn matches_record(&self, r: &ExecutionRecord) -> bool {
        if let Some(v) = &self.migration_id {
            if &r.migration_id != v {
                return false;
            }
        }
        if let Some(v) = &self.schema {
            if &r.schema != v {
                return false;
            }
        }
        if let Some(v) = &self.table {
            if r.table.as_deref() != Some(v.as_str()) {
                return false;
            }
        }
        if let Some(v) = &self.connection {
            if &r.connection != v {
                return false;
            }
        }
        if let Some(v) = &self.backend {
            if r.backend != *v {
                return false;
            }
        }
        if let Some(v) = &self.status {
            if r.status != *v {
                return false;
            }
        }
        if let Some(v) = &self.version {
            if &r.version != v {
                return false;
            }
        }
        true
    }

    pub fn matches_scanned(&self, s: &ScannedMigration) -> bool {
        if let Some(v) = &self.migration_id {
            if &s.migration_id != v {
                return false;
            }
        }
        if let Some(v) = &self.schema {
            if &s.schema != v {
                return false;
            }
        }
        if let Some(v) = &self.table {
            if s.table.as_deref() != Some(v.as_str()) {
                return false;
            }
        }
        if let Some(v) = &self.connection {
            if &s.connection != v {
                return false;
            }
        }
        if let Some(v) = &self.backend {
            if s.backend != *v {
                return false;
            }
        }
        if let Some(v) = &self.status {
            if s.last_status != Some(*v) {
                return false;
            }
        }
        if let Some(v) = &self.version {
            if &s.version != v {
                return false;
            }
        }
        true
    }
}
