use crate::model::{Backend, ExecutionMethod, ExecutionRecord, ExecutionStatus, HistoryFilter, ScannedMigration};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, QueryBuilder, Row};

/// Postgres-backed meta-DB state tracker. Stores two tables in
/// the operator-configured meta connection, independent of whichever
/// backend(s) the tracked migrations themselves target: an append-only
/// execution history, and a denormalized "currently known migrations" table
/// the Reindexer reconciles against the filesystem.
pub struct PostgresStateTracker {
    pool: PgPool,
}

impl PostgresStateTracker {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
        Ok(PostgresStateTracker { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PostgresStateTracker { pool }
    }

    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS bfm_execution_history (
                migration_id      TEXT NOT NULL,
                schema_name       TEXT NOT NULL,
                table_name        TEXT,
                version           TEXT NOT NULL,
                connection        TEXT NOT NULL,
                backend           TEXT NOT NULL,
                applied_at        TIMESTAMPTZ NOT NULL,
                status            TEXT NOT NULL,
                error_message     TEXT,
                executed_by       TEXT NOT NULL,
                execution_method  TEXT NOT NULL,
                execution_context TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS bfm_execution_history_migration_id_idx
                ON bfm_execution_history (migration_id, applied_at);

            CREATE TABLE IF NOT EXISTS bfm_scanned_migrations (
                migration_id TEXT PRIMARY KEY,
                version      TEXT NOT NULL,
                name         TEXT NOT NULL,
                backend      TEXT NOT NULL,
                connection   TEXT NOT NULL,
                schema_name  TEXT NOT NULL,
                table_name   TEXT,
                last_status  TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record(&self, record: &ExecutionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO bfm_execution_history
                (migration_id, schema_name, table_name, version, connection, backend,
                 applied_at, status, error_message, executed_by, execution_method, execution_context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&record.migration_id)
        .bind(&record.schema)
        .bind(&record.table)
        .bind(&record.version)
        .bind(&record.connection)
        .bind(record.backend.tag())
        .bind(record.applied_at)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(&record.executed_by)
        .bind(record.execution_method.as_str())
        .bind(&record.execution_context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_applied(&self, migration_id: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT status FROM bfm_execution_history
             WHERE migration_id = $1 ORDER BY applied_at DESC LIMIT 1",
        )
        .bind(migration_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => row.get::<String, _>("status") == ExecutionStatus::Success.as_str(),
            None => false,
        })
    }

    /// Filtered by any subset of `{schema, table, connection, backend, status,
    /// version}`; newest first.
    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionRecord>, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT * FROM bfm_execution_history WHERE 1 = 1");
        if let Some(v) = &filter.migration_id {
            qb.push(" AND migration_id = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.schema {
            qb.push(" AND schema_name = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.table {
            qb.push(" AND table_name = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.connection {
            qb.push(" AND connection = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.backend {
            qb.push(" AND backend = ").push_bind(v.tag());
        }
        if let Some(v) = &filter.status {
            qb.push(" AND status = ").push_bind(v.as_str());
        }
        if let Some(v) = &filter.version {
            qb.push(" AND version = ").push_bind(v.clone());
        }
        qb.push(" ORDER BY applied_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_record).collect()
    }

    /// Same filter surface as [`Self::history`], applied to the scanned-list
    /// table; `status` here matches the denormalized `last_status`.
    pub async fn list(&self, filter: &HistoryFilter) -> Result<Vec<ScannedMigration>, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT * FROM bfm_scanned_migrations WHERE 1 = 1");
        if let Some(v) = &filter.migration_id {
            qb.push(" AND migration_id = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.schema {
            qb.push(" AND schema_name = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.table {
            qb.push(" AND table_name = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.connection {
            qb.push(" AND connection = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.backend {
            qb.push(" AND backend = ").push_bind(v.tag());
        }
        if let Some(v) = &filter.status {
            qb.push(" AND last_status = ").push_bind(v.as_str());
        }
        if let Some(v) = &filter.version {
            qb.push(" AND version = ").push_bind(v.clone());
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_scanned).collect()
    }

    /// Highest version among successfully applied execution records for
    /// `(schema, table)`. `table` matched against `NULL` when empty.
    pub async fn last_version(&self, schema: &str, table: &str) -> Result<Option<String>, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT version FROM bfm_execution_history WHERE schema_name = ");
        qb.push_bind(schema.to_string());
        qb.push(" AND status = ").push_bind(ExecutionStatus::Success.as_str());
        if table.is_empty() {
            qb.push(" AND table_name IS NULL");
        } else {
            qb.push(" AND table_name = ").push_bind(table.to_string());
        }
        qb.push(" ORDER BY version DESC LIMIT 1");

        let row = qb.build().fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.get::<String, _>("version")))
    }

    pub async fn register_scanned(&self, scanned: &ScannedMigration) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO bfm_scanned_migrations
                (migration_id, version, name, backend, connection, schema_name, table_name, last_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (migration_id) DO UPDATE SET
                version = EXCLUDED.version,
                name = EXCLUDED.name,
                backend = EXCLUDED.backend,
                connection = EXCLUDED.connection,
                schema_name = EXCLUDED.schema_name,
                table_name = EXCLUDED.table_name,
                last_status = EXCLUDED.last_status
            "#,
        )
        .bind(&scanned.migration_id)
        .bind(&scanned.version)
        .bind(&scanned.name)
        .bind(scanned.backend.tag())
        .bind(&scanned.connection)
        .bind(&scanned.schema)
        .bind(&scanned.table)
        .bind(scanned.last_status.map(|s| s.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update the metadata fields of an already-registered migration; used
    /// by the Reindexer's "Updated" event when a migration's
    /// schema/version/name/connection drifts from the last scan.
    pub async fn update_info(&self, scanned: &ScannedMigration) -> Result<(), sqlx::Error> {
        self.register_scanned(scanned).await
    }

    pub async fn delete(&self, migration_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM bfm_scanned_migrations WHERE migration_id = $1")
            .bind(migration_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> Result<ExecutionRecord, sqlx::Error> {
    let backend_tag: String = row.try_get("backend")?;
    let status_tag: String = row.try_get("status")?;
    let method_tag: String = row.try_get("execution_method")?;

    Ok(ExecutionRecord {
        migration_id: row.try_get("migration_id")?,
        schema: row.try_get("schema_name")?,
        table: row.try_get("table_name")?,
        version: row.try_get("version")?,
        connection: row.try_get("connection")?,
        backend: Backend::parse(&backend_tag).unwrap_or(Backend::Postgresql),
        applied_at: row.try_get("applied_at")?,
        status: ExecutionStatus::parse(&status_tag).unwrap_or(ExecutionStatus::Failed),
        error_message: row.try_get("error_message")?,
        executed_by: row.try_get("executed_by")?,
        execution_method: ExecutionMethod::parse(&method_tag).unwrap_or(ExecutionMethod::Api),
        execution_context: row.try_get("execution_context")?,
    })
}

fn row_to_scanned(row: sqlx::postgres::PgRow) -> Result<ScannedMigration, sqlx::Error> {
    let backend_tag: String = row.try_get("backend")?;
    let status_tag: Option<String> = row.try_get("last_status")?;

    Ok(ScannedMigration {
        migration_id: row.try_get("migration_id")?,
        version: row.try_get("version")?,
        name: row.try_get("name")?,
        backend: Backend::parse(&backend_tag).unwrap_or(Backend::Postgresql),
        connection: row.try_get("connection")?,
        schema: row.try_get("schema_name")?,
        table: row.try_get("table_name")?,
        last_status: status_tag.and_then(|s| ExecutionStatus::parse(&s)),
    })
}
