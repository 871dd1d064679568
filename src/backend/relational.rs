use super::error::{EngineError, EngineErrorKind};
use crate::config::{ConnectionConfig, PoolConfig};
use crate::model::Migration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Relational (PostgreSQL) backend adapter. Stateless across
/// calls: a fresh pool is acceptable to open per `execute`, though
/// this implementation lazily caches one and reuses it for the adapter's
/// lifetime, closing it only on an explicit `close()`.
pub struct RelationalEngine {
    config: ConnectionConfig,
    pool_config: PoolConfig,
    pool: Option<PgPool>,
}

impl RelationalEngine {
    pub fn new(config: ConnectionConfig, pool_config: PoolConfig) -> Self {
        RelationalEngine { config, pool_config, pool: None }
    }

    pub async fn connect(&mut self) -> Result<(), EngineError> {
        if self.pool.is_none() {
            let pool = PgPoolOptions::new()
                .max_connections(self.pool_config.max_open_conns)
                .min_connections(self.pool_config.max_idle_conns)
                .max_lifetime(Duration::from_secs(self.pool_config.conn_max_lifetime_minutes * 60))
                .idle_timeout(Duration::from_secs(self.pool_config.conn_max_idle_time_minutes * 60))
                .connect(&self.config.postgres_url())
                .await?;
            self.pool = Some(pool);
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), EngineError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn pool(&mut self) -> Result<&PgPool, EngineError> {
        self.connect().await?;
        self.pool.as_ref().ok_or(EngineError { kind: EngineErrorKind::ConnectionNotOpen })
    }

    pub async fn create_schema(&mut self, name: &str) -> Result<(), EngineError> {
        let pool = self.pool().await?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{name}\""))
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn schema_exists(&mut self, name: &str) -> Result<bool, EngineError> {
        let pool = self.pool().await?;
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM information_schema.schemata WHERE schema_name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn table_exists(&mut self, schema: &str, name: &str) -> Result<bool, EngineError> {
        let pool = self.pool().await?;
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
        )
        .bind(schema)
        .bind(name)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    /// Execute the migration's payload as a single multi-statement command
    /// inside a transaction. If `schema` is non-empty: ensure it exists,
    /// then set a per-transaction search path to `{schema}, public` before
    /// executing. Commits on success, rolls back on any error.
    pub async fn execute(&mut self, _migration: &Migration, schema: &str, payload: &[u8]) -> Result<(), EngineError> {
        if !schema.is_empty() {
            self.create_schema(schema).await?;
        }

        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        if !schema.is_empty() {
            sqlx::query(&format!("SET search_path TO \"{schema}\", public"))
                .execute(&mut *tx)
                .await?;
        }

        let sql = String::from_utf8_lossy(payload);
        let result = sqlx::raw_sql(&sql).execute(&mut *tx).await;

        match result {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                // Rollback is best-effort: the transaction is dropped either way,
                // but an explicit rollback surfaces a clear log line upstream.
                let _ = tx.rollback().await;
                Err(EngineError::from(e))
            }
        }
    }

    pub async fn health_check(&mut self) -> Result<(), EngineError> {
        let pool = self.pool().await?;
        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool))
            .await
            .map_err(|_| EngineError { kind: EngineErrorKind::HealthCheckTimedOut })??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::model::Backend;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            name: "core".into(),
            backend: Backend::Postgresql,
            host: "localhost".into(),
            port: 5432,
            username: "bfm".into(),
            password: "pw".into(),
            database: "core".into(),
            schema: "public".into(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn pool_config_defaults_match_spec() {
        let pool_config = PoolConfig::default();
        assert_eq!(pool_config.max_open_conns, 5);
        assert_eq!(pool_config.max_idle_conns, 2);
    }

    #[test]
    fn new_engine_starts_without_an_open_pool() {
        let engine = RelationalEngine::new(config(), PoolConfig::default());
        assert!(engine.pool.is_none());
    }
}
