mod error;
pub mod kv;
pub mod memory;
pub mod relational;
pub mod timeseries;

pub use error::{EngineError, EngineErrorKind};
use kv::KvEngine;
use memory::MemoryEngine;
use relational::RelationalEngine;
use timeseries::TimeseriesEngine;

use crate::config::{ConnectionConfig, PoolConfig};
use crate::model::{Backend, Migration};

/// Enum dispatch over the three concrete backend adapters. A
/// fixed, closed set of variants avoids `dyn Trait` object-safety issues
/// that come from mixing async methods with trait objects, while still
/// giving callers (executor, validator, reindexer) one type to hold.
pub enum EngineBackend {
    Relational(RelationalEngine),
    Timeseries(TimeseriesEngine),
    Kv(KvEngine),
    Memory(MemoryEngine),
}

impl EngineBackend {
    pub fn new(config: ConnectionConfig, pool_config: PoolConfig) -> Result<Self, EngineError> {
        Ok(match config.backend {
            Backend::Postgresql => EngineBackend::Relational(RelationalEngine::new(config, pool_config)),
            Backend::Greptimedb => EngineBackend::Timeseries(TimeseriesEngine::new(config)?),
            Backend::Etcd => EngineBackend::Kv(KvEngine::new(config)),
        })
    }

    pub fn memory() -> Self {
        EngineBackend::Memory(MemoryEngine::new())
    }

    pub async fn connect(&mut self) -> Result<(), EngineError> {
        match self {
            EngineBackend::Relational(e) => e.connect().await,
            EngineBackend::Timeseries(_) => Ok(()),
            EngineBackend::Kv(e) => e.connect().await,
            EngineBackend::Memory(e) => e.connect().await,
        }
    }

    pub async fn close(&mut self) -> Result<(), EngineError> {
        match self {
            EngineBackend::Relational(e) => e.close().await,
            EngineBackend::Timeseries(_) => Ok(()),
            EngineBackend::Kv(e) => e.close().await,
            EngineBackend::Memory(e) => e.close().await,
        }
    }

    pub async fn create_schema(&mut self, name: &str) -> Result<(), EngineError> {
        match self {
            EngineBackend::Relational(e) => e.create_schema(name).await,
            EngineBackend::Timeseries(e) => e.create_database(name).await,
            EngineBackend::Kv(_) => Ok(()),
            EngineBackend::Memory(e) => e.create_schema(name).await,
        }
    }

    pub async fn schema_exists(&mut self, name: &str) -> Result<bool, EngineError> {
        match self {
            EngineBackend::Relational(e) => e.schema_exists(name).await,
            EngineBackend::Timeseries(e) => e.schema_exists(name).await,
            EngineBackend::Kv(e) => e.schema_exists(name).await,
            EngineBackend::Memory(e) => e.schema_exists(name).await,
        }
    }

    pub async fn table_exists(&mut self, schema: &str, name: &str) -> Result<bool, EngineError> {
        match self {
            EngineBackend::Relational(e) => e.table_exists(schema, name).await,
            EngineBackend::Timeseries(e) => e.table_exists(schema, name).await,
            EngineBackend::Kv(e) => e.table_exists(schema, name).await,
            EngineBackend::Memory(e) => e.table_exists(schema, name).await,
        }
    }

    /// Execute an explicit `payload` (the migration's up- or down-payload,
    /// caller's choice) against `schema`. Taking the payload as a parameter
    /// rather than always reaching for `migration.up_payload` is what lets
    /// the executor reuse one code path for both forward migration and
    /// rollback.
    pub async fn execute(&mut self, migration: &Migration, schema: &str, payload: &[u8]) -> Result<(), EngineError> {
        match self {
            EngineBackend::Relational(e) => e.execute(migration, schema, payload).await,
            EngineBackend::Timeseries(e) => e.execute(migration, schema, payload).await,
            EngineBackend::Kv(e) => e.execute(migration, schema, payload).await,
            EngineBackend::Memory(e) => e.execute(migration, schema, payload).await,
        }
    }

    pub async fn health_check(&mut self) -> Result<(), EngineError> {
        match self {
            EngineBackend::Relational(e) => e.health_check().await,
            EngineBackend::Timeseries(e) => e.health_check().await,
            EngineBackend::Kv(e) => e.health_check().await,
            EngineBackend::Memory(e) => e.health_check().await,
        }
    }
}
