pub mod backend;
pub mod migration;
pub mod record;
pub mod target;

pub use backend::Backend;
pub use migration::{
    parse_version_and_name, resolve_migration_id, schema_prefixed_id, validate_version, Dependency,
    DependencyTargetType, Migration, VersionError,
};
pub use record::{
    ExecutionContext, ExecutionMethod, ExecutionRecord, ExecutionStatus, HistoryFilter, ScannedMigration,
};
pub use target::Target;
