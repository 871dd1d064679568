use crate::backend::EngineBackend;
use crate::catalog::Catalog;
use crate::error::{BfmError, BfmErrorKind};
use crate::model::{
    resolve_migration_id, schema_prefixed_id, Backend, ExecutionContext, ExecutionRecord, ExecutionStatus, Migration,
    Target,
};
use crate::queue::{ChannelQueue, Job, Queue};
use crate::resolver::{self, ResolverError};
use crate::state::StateStore;
use crate::validator::{self, ValidationError, ValidationFacts};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

fn state_err(e: sqlx::Error) -> BfmError {
    BfmError { kind: BfmErrorKind::State(e) }
}

fn validation_err(errors: Vec<ValidationError>) -> BfmError {
    BfmError { kind: BfmErrorKind::Validation(errors.into_iter().map(|e| e.to_string()).collect()) }
}

impl From<ResolverError> for BfmError {
    fn from(e: ResolverError) -> Self {
        BfmError { kind: BfmErrorKind::Validation(vec![e.to_string()]) }
    }
}

/// Result of one `execute_sync`/`execute_up`/`execute_down`/`rollback` call.
/// A partial success — some migrations `Applied`, some
/// `Errors` — is a first-class outcome and is never rolled back; `Skipped`
/// entries never touched the backend at all.
#[derive(Debug, Default, Clone)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

impl ExecuteOutcome {
    fn merge(&mut self, other: ExecuteOutcome) {
        self.applied.extend(other.applied);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
        self.success = self.errors.is_empty();
    }
}

/// Outcome of the top-level [`Executor::execute`] entry point: either the
/// batch ran synchronously, or (a queue is attached) the work was handed off
/// and the caller gets back a job id instead.
#[derive(Debug, Clone)]
pub enum ExecuteResult {
    Queued { job_id: uuid::Uuid },
    Ran(ExecuteOutcome),
}

/// Drives migrations from the catalog against their configured backends,
/// recording every attempt in the meta-DB.
pub struct Executor {
    backends: HashMap<String, Mutex<EngineBackend>>,
    state: StateStore,
    queue: Option<ChannelQueue>,
}

impl Executor {
    pub fn new(backends: HashMap<String, Mutex<EngineBackend>>, state: StateStore) -> Self {
        Executor { backends, state, queue: None }
    }

    /// Build an executor with a queue attached: `execute` then publishes
    /// instead of running synchronously.
    pub fn with_queue(backends: HashMap<String, Mutex<EngineBackend>>, state: StateStore, queue: ChannelQueue) -> Self {
        Executor { backends, state, queue: Some(queue) }
    }

    /// `execute(target, connection, schema, dry_run)`: if a queue is
    /// attached, publish a job `{id, target, connection, schema, dry_run,
    /// metadata}` and return immediately instead of running anything on this
    /// call; otherwise this is equivalent to `execute_sync`.
    pub async fn execute(
        &self,
        catalog: &Catalog,
        target: &Target,
        connection: &str,
        schema: &str,
        context: ExecutionContext,
        dry_run: bool,
    ) -> Result<ExecuteResult, BfmError> {
        if let Some(queue) = &self.queue {
            let mut job_target = target.clone();
            if job_target.connection.is_none() && !connection.is_empty() {
                job_target.connection = Some(connection.to_string());
            }
            let metadata = Some(context.context.clone()).filter(|c| !c.is_empty());
            let job = Job::new(job_target, connection, schema, dry_run, metadata);
            let job_id = job.id;
            queue.publish(job).await?;
            return Ok(ExecuteResult::Queued { job_id });
        }

        let outcome = self.execute_sync(catalog, target, schema, context, dry_run).await?;
        Ok(ExecuteResult::Ran(outcome))
    }

    fn backend(&self, connection: &str) -> Result<&Mutex<EngineBackend>, BfmError> {
        self.backends
            .get(connection)
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(format!("connection '{connection}'")) })
    }

    /// Resolve the dependency-schema priority chain the same
    /// way the validator does, so facts are gathered for the schema they'll
    /// actually be checked against.
    fn dependency_schema(dep: &crate::model::Dependency, migration: &Migration, execution_schema: &str) -> String {
        if let Some(s) = &dep.requires_schema {
            return s.clone();
        }
        if let Some(s) = &dep.schema {
            return s.clone();
        }
        if !migration.schema.is_empty() {
            return migration.schema.clone();
        }
        execution_schema.to_string()
    }

    async fn gather_facts(
        &self,
        migrations: &[Migration],
        execution_schema: &str,
        in_batch_ids: &HashSet<String>,
        by_id: &HashMap<String, Migration>,
    ) -> Result<ValidationFacts, BfmError> {
        let mut facts = ValidationFacts::default();

        for migration in migrations {
            for dep in migration.all_dependencies() {
                let targets = resolver::resolve_target(migration, &dep, by_id);
                let dep_schema = Self::dependency_schema(&dep, migration, execution_schema);

                for target in &targets {
                    let target_id = target.canonical_id();
                    if !in_batch_ids.contains(&target_id) {
                        let schema_prefixed = schema_prefixed_id(&dep_schema, &target_id);
                        if self.state.is_applied(&schema_prefixed).await.map_err(state_err)? {
                            facts.applied_ids.insert(schema_prefixed);
                        } else if self.state.is_applied(&target_id).await.map_err(state_err)? {
                            facts.applied_ids.insert(target_id.clone());
                        }
                    }

                    if let Some(table) = &dep.requires_table {
                        if !in_batch_ids.contains(&target_id) {
                            if let Ok(lock) = self.backend(&target.connection) {
                                let mut engine = lock.lock().await;
                                if engine.table_exists(&dep_schema, table).await? {
                                    facts
                                        .existing_tables
                                        .insert((target.connection.clone(), dep_schema.clone(), table.clone()));
                                }
                            }
                        }
                    }
                }

                if let Some(schema_name) = &dep.requires_schema {
                    if let Ok(lock) = self.backend(&migration.connection) {
                        let mut engine = lock.lock().await;
                        if engine.schema_exists(schema_name).await? {
                            facts.existing_schemas.insert((migration.connection.clone(), schema_name.clone()));
                        }
                    }
                }
            }
        }

        Ok(facts)
    }

    /// Validate only the `postgresql` migrations of a batch: "for the
    /// postgresql backend only, invoke the Validator on each
    /// migration". The other two backends have no notion of schema/table
    /// existence worth gating execution on, so the validator is skipped for
    /// them; they still go through dependency-applied-state checks via
    /// `is_applied` at execution time (the skip check below), just not the
    /// schema/table precondition path.
    async fn validate_postgresql_migrations(
        &self,
        ordered: &[Migration],
        execution_schema: &str,
        in_batch_ids: &HashSet<String>,
        by_id: &HashMap<String, Migration>,
    ) -> Result<(), BfmError> {
        let postgres_migrations: Vec<Migration> =
            ordered.iter().filter(|m| m.backend == Backend::Postgresql).cloned().collect();
        if postgres_migrations.is_empty() {
            return Ok(());
        }

        let facts = self.gather_facts(&postgres_migrations, execution_schema, in_batch_ids, by_id).await?;

        let mut errors = Vec::new();
        for migration in &postgres_migrations {
            if let Err(mut e) = validator::validate_migration(migration, execution_schema, in_batch_ids, by_id, &facts)
            {
                errors.append(&mut e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(validation_err(errors))
        }
    }

    async fn run_one(
        &self,
        migration: &Migration,
        schema: &str,
        payload: &[u8],
        context: &ExecutionContext,
        status_on_rollback: bool,
    ) -> (String, Result<(), BfmError>) {
        let canonical_id = migration.canonical_id();
        // Recorded under the same tracked id as the original apply, rollback
        // or not: `is_applied` reads the latest row for an id, so a
        // `RolledBack` row here is what flips it back to false. `history`
        // then returns the full apply/rollback lifecycle under one id.
        let record_id = schema_prefixed_id(schema, &canonical_id);

        let lock = match self.backend(&migration.connection) {
            Ok(lock) => lock,
            Err(e) => return (canonical_id, Err(e)),
        };
        let mut engine = lock.lock().await;
        let outcome = engine.execute(migration, schema, payload).await;
        drop(engine);

        let (status, error_message) = match &outcome {
            Ok(()) if status_on_rollback => (ExecutionStatus::RolledBack, None),
            Ok(()) => (ExecutionStatus::Success, None),
            Err(e) => (ExecutionStatus::Failed, Some(e.to_string())),
        };

        let record = ExecutionRecord {
            migration_id: record_id,
            schema: schema.to_string(),
            table: migration.table.clone(),
            version: migration.version.clone(),
            connection: migration.connection.clone(),
            backend: migration.backend,
            applied_at: Utc::now(),
            status,
            error_message,
            executed_by: context.executed_by.clone(),
            execution_method: context.method,
            execution_context: context.context.clone(),
        };

        let record_result = self.state.record(&record).await.map_err(state_err);

        let result = match (outcome, record_result) {
            (Err(e), _) => {
                tracing::error!("execution of {canonical_id} failed: {e}");
                Err(BfmError::from(e))
            }
            (Ok(()), Err(state_error)) => Err(state_error),
            (Ok(()), Ok(())) => Ok(()),
        };

        (canonical_id, result)
    }

    /// `execute_sync(target, schema, dry_run)`. Filters the
    /// catalog by `target`, resolves dependency order, runs the
    /// postgresql-only validator, then dispatches each migration in order,
    /// skipping those already applied and collecting per-migration success
    /// or failure rather than aborting the batch on the first error.
    pub async fn execute_sync(
        &self,
        catalog: &Catalog,
        target: &Target,
        schema: &str,
        context: ExecutionContext,
        dry_run: bool,
    ) -> Result<ExecuteOutcome, BfmError> {
        let selected = catalog.find_by_target(target);
        if selected.is_empty() {
            return Ok(ExecuteOutcome { success: true, ..Default::default() });
        }

        let all = catalog.get_all();
        let expanded = resolver::expand_with_pending_dependencies(selected, &all);
        let order = resolver::resolve_order(&expanded)?;

        let by_id: HashMap<String, Migration> = expanded.iter().map(|m| (m.canonical_id(), m.clone())).collect();
        let in_batch: HashSet<String> = by_id.keys().cloned().collect();
        let ordered: Vec<Migration> = order.iter().map(|id| by_id[id].clone()).collect();

        self.validate_postgresql_migrations(&ordered, schema, &in_batch, &by_id).await?;

        let mut outcome = ExecuteOutcome { success: true, ..Default::default() };

        for migration in &ordered {
            let effective_schema = if !schema.is_empty() { schema } else { &migration.schema };
            let canonical_id = migration.canonical_id();
            let tracked_id = schema_prefixed_id(effective_schema, &canonical_id);

            if self.state.is_applied(&tracked_id).await.map_err(state_err)? {
                outcome.skipped.push(tracked_id);
                continue;
            }

            if dry_run {
                outcome.applied.push(format!("{tracked_id} (dry-run)"));
                continue;
            }

            let (_, result) =
                self.run_one(migration, effective_schema, &migration.up_payload, &context, false).await;
            match result {
                Ok(()) => outcome.applied.push(tracked_id),
                Err(e) => outcome.errors.push(format!("{tracked_id}: {e}")),
            }
        }

        outcome.success = outcome.errors.is_empty();
        Ok(outcome)
    }

    /// `execute_up(target, schemas, dry_run)`: fan out
    /// `execute_sync` over each schema in `schemas`, substituting `[""]`
    /// when empty, and concatenate the results.
    pub async fn execute_up(
        &self,
        catalog: &Catalog,
        target: &Target,
        schemas: &[String],
        context: ExecutionContext,
        dry_run: bool,
    ) -> Result<ExecuteOutcome, BfmError> {
        let fan_out: Vec<String> = if schemas.is_empty() { vec![String::new()] } else { schemas.to_vec() };

        let mut outcome = ExecuteOutcome { success: true, ..Default::default() };
        for schema in &fan_out {
            let result = self.execute_sync(catalog, target, schema, context.clone(), dry_run).await?;
            outcome.merge(result);
        }
        Ok(outcome)
    }

    /// `execute_down(migration_id, schemas, dry_run)`: requires
    /// a non-empty down payload; for each schema, checks applied state using
    /// the schema-prefixed id, dispatches `down_payload` in place of
    /// `up_payload` when applied and not dry-run, and records a
    /// `rolled_back` row under that same tracked id so `is_applied` flips
    /// back to false.
    pub async fn execute_down(
        &self,
        catalog: &Catalog,
        migration_ref: &str,
        schemas: &[String],
        context: ExecutionContext,
        dry_run: bool,
    ) -> Result<ExecuteOutcome, BfmError> {
        let all = catalog.get_all();
        let canonical_id = resolve_migration_id(migration_ref, all.iter())
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(format!("migration '{migration_ref}'")) })?;
        let migration = catalog
            .get(&canonical_id)
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(canonical_id.clone()) })?;

        let down_payload = migration.down_payload.clone().ok_or_else(|| BfmError {
            kind: BfmErrorKind::Validation(vec![format!("migration '{canonical_id}' has no down payload")]),
        })?;

        let fan_out: Vec<String> =
            if schemas.is_empty() { vec![migration.schema.clone()] } else { schemas.to_vec() };

        let mut outcome = ExecuteOutcome { success: true, ..Default::default() };

        for schema in &fan_out {
            let applied_id = schema_prefixed_id(schema, &canonical_id);

            if !self.state.is_applied(&applied_id).await.map_err(state_err)? {
                outcome.skipped.push(applied_id);
                continue;
            }

            if dry_run {
                outcome.applied.push(format!("{applied_id}_down (dry-run)"));
                continue;
            }

            let (_, result) = self.run_one(&migration, schema, &down_payload, &context, true).await;
            match result {
                Ok(()) => outcome.applied.push(format!("{applied_id}_down")),
                Err(e) => outcome.errors.push(format!("{applied_id}_down: {e}")),
            }
        }

        outcome.success = outcome.errors.is_empty();
        Ok(outcome)
    }

    /// Execute a single migration, identified by any id shape
    /// [`resolve_migration_id`] accepts, against one schema. Used by the
    /// queue worker, where a job names exactly one migration
    /// rather than a `Target` filter over the catalog.
    pub async fn execute_one(
        &self,
        catalog: &Catalog,
        migration_ref: &str,
        schema: &str,
        context: ExecutionContext,
        dry_run: bool,
    ) -> Result<ExecuteOutcome, BfmError> {
        let all = catalog.get_all();
        let canonical_id = resolve_migration_id(migration_ref, all.iter())
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(format!("migration '{migration_ref}'")) })?;
        let migration = catalog
            .get(&canonical_id)
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(canonical_id.clone()) })?;

        let effective_schema = if !schema.is_empty() { schema.to_string() } else { migration.schema.clone() };
        let in_batch: HashSet<String> = std::iter::once(canonical_id.clone()).collect();
        let by_id: HashMap<String, Migration> = std::iter::once((canonical_id.clone(), migration.clone())).collect();

        self.validate_postgresql_migrations(
            std::slice::from_ref(&migration),
            &effective_schema,
            &in_batch,
            &by_id,
        )
        .await?;

        let tracked_id = schema_prefixed_id(&effective_schema, &canonical_id);
        let mut outcome = ExecuteOutcome { success: true, ..Default::default() };

        if self.state.is_applied(&tracked_id).await.map_err(state_err)? {
            outcome.skipped.push(tracked_id);
            return Ok(outcome);
        }

        if dry_run {
            outcome.applied.push(format!("{tracked_id} (dry-run)"));
            return Ok(outcome);
        }

        let (_, result) = self.run_one(&migration, &effective_schema, &migration.up_payload, &context, false).await;
        match result {
            Ok(()) => outcome.applied.push(tracked_id),
            Err(e) => {
                outcome.errors.push(format!("{tracked_id}: {e}"));
                outcome.success = false;
            }
        }

        Ok(outcome)
    }

    /// Single-schema variant of `execute_down`, rolling back a migration in
    /// its own declared schema.
    pub async fn rollback(
        &self,
        catalog: &Catalog,
        migration_ref: &str,
        context: ExecutionContext,
        dry_run: bool,
    ) -> Result<ExecuteOutcome, BfmError> {
        let all = catalog.get_all();
        let canonical_id = resolve_migration_id(migration_ref, all.iter())
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(format!("migration '{migration_ref}'")) })?;
        let migration = catalog
            .get(&canonical_id)
            .ok_or_else(|| BfmError { kind: BfmErrorKind::NotFound(canonical_id.clone()) })?;

        let schema = migration.schema.clone();
        self.execute_down(catalog, &canonical_id, std::slice::from_ref(&schema), context, dry_run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryEngine;
    use crate::model::Backend;
    use crate::state::MemoryStateTracker;

    fn migration(name: &str, dependencies: Vec<&str>) -> Migration {
        Migration {
            version: "20240101120000".into(),
            name: name.into(),
            backend: Backend::Postgresql,
            connection: "core".into(),
            schema: "public".into(),
            table: None,
            up_payload: b"CREATE TABLE t();".to_vec(),
            down_payload: Some(b"DROP TABLE t;".to_vec()),
            dependencies: dependencies.into_iter().map(String::from).collect(),
            structured_dependencies: vec![],
        }
    }

    fn executor() -> Executor {
        let mut backends = HashMap::new();
        backends.insert("core".to_string(), Mutex::new(EngineBackend::Memory(MemoryEngine::new())));
        Executor::new(backends, StateStore::Memory(MemoryStateTracker::new()))
    }

    #[tokio::test]
    async fn empty_catalog_returns_a_vacuous_success() {
        let exec = executor();
        let catalog = Catalog::new();
        let outcome = exec
            .execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), false)
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.applied.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn execute_sync_records_a_success() {
        let exec = executor();
        let catalog = Catalog::new();
        let m = migration("create_users", vec![]);
        catalog.register(m.clone());

        let outcome = exec
            .execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), false)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.applied.len(), 1);
    }

    #[tokio::test]
    async fn second_execution_skips_instead_of_re_invoking_the_backend() {
        let exec = executor();
        let catalog = Catalog::new();
        let m = migration("create_users", vec![]);
        catalog.register(m.clone());

        exec.execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), false).await.unwrap();
        let second = exec
            .execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), false)
            .await
            .unwrap();

        assert!(second.applied.is_empty());
        assert_eq!(second.skipped.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_does_not_touch_the_backend_or_record_history() {
        let exec = executor();
        let catalog = Catalog::new();
        let m = migration("create_users", vec![]);
        catalog.register(m.clone());

        let outcome = exec
            .execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), true)
            .await
            .unwrap();

        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.applied[0].ends_with("(dry-run)"));

        let second = exec
            .execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), false)
            .await
            .unwrap();
        // Dry run wrote no history row, so the real run still applies it.
        assert_eq!(second.applied.len(), 1);
    }

    #[tokio::test]
    async fn execute_up_runs_dependencies_before_dependents() {
        let exec = executor();
        let catalog = Catalog::new();
        let bootstrap = migration("bootstrap", vec![]);
        let dependent = migration("create_users", vec!["bootstrap"]);
        catalog.register(bootstrap.clone());
        catalog.register(dependent.clone());

        let outcome = exec
            .execute_up(&catalog, &Target::default(), &[], ExecutionContext::default(), false)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.applied.len(), 2);
        assert!(outcome.applied[0].contains("bootstrap"));
        assert!(outcome.applied[1].contains("create_users"));
    }

    #[tokio::test]
    async fn partial_failure_does_not_abort_the_remaining_batch() {
        let exec = executor();
        let catalog = Catalog::new();
        let first = migration("a_ok", vec![]);
        let mut second = migration("b_fails", vec![]);
        second.version = "20240101120001".into();
        catalog.register(first.clone());
        catalog.register(second.clone());

        // Arms a one-shot failure that the first dispatched migration (lowest
        // version, so `first`) will consume; the second then runs clean.
        {
            let engine = exec.backends["core"].lock().await;
            if let EngineBackend::Memory(mem) = &*engine {
                *mem.fail_next.lock().unwrap() = true;
            }
        }

        let outcome = exec
            .execute_up(&catalog, &Target::default(), &[], ExecutionContext::default(), false)
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.errors.len(), 1);

        let rerun = exec
            .execute_up(&catalog, &Target::default(), &[], ExecutionContext::default(), false)
            .await
            .unwrap();
        assert_eq!(rerun.skipped.len(), 1);
        assert_eq!(rerun.applied.len(), 1);
    }

    #[tokio::test]
    async fn rollback_requires_a_down_payload() {
        let exec = executor();
        let catalog = Catalog::new();
        let mut m = migration("create_users", vec![]);
        m.down_payload = None;
        catalog.register(m.clone());

        let result = exec.rollback(&catalog, &m.canonical_id(), ExecutionContext::default(), false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rollback_applies_down_payload_and_clears_applied_state() {
        let exec = executor();
        let catalog = Catalog::new();
        let m = migration("create_users", vec![]);
        catalog.register(m.clone());

        exec.execute_sync(&catalog, &Target::default(), "", ExecutionContext::default(), false).await.unwrap();
        let outcome = exec.rollback(&catalog, &m.canonical_id(), ExecutionContext::default(), false).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.applied[0].ends_with("_down"));

        let tracked_id = schema_prefixed_id(&m.schema, &m.canonical_id());
        assert!(!exec.state.is_applied(&tracked_id).await.unwrap());
    }

    #[tokio::test]
    async fn execute_with_queue_attached_publishes_instead_of_running() {
        let mut backends = HashMap::new();
        backends.insert("core".to_string(), Mutex::new(EngineBackend::Memory(MemoryEngine::new())));
        let (queue, mut receiver) = crate::queue::ChannelQueue::new(4);
        let exec = Executor::with_queue(backends, StateStore::Memory(MemoryStateTracker::new()), queue);
        let catalog = Catalog::new();
        let m = migration("create_users", vec![]);
        catalog.register(m.clone());

        let result = exec
            .execute(&catalog, &Target::default(), "core", "public", ExecutionContext::default(), false)
            .await
            .unwrap();

        match result {
            ExecuteResult::Queued { job_id } => {
                let job = receiver.recv().await.unwrap();
                assert_eq!(job.id, job_id);
                assert_eq!(job.connection, "core");
                assert_eq!(job.schema, "public");
            }
            ExecuteResult::Ran(_) => panic!("expected a queued result"),
        }
    }

    #[tokio::test]
    async fn execute_without_a_queue_runs_synchronously() {
        let exec = executor();
        let catalog = Catalog::new();
        let m = migration("create_users", vec![]);
        catalog.register(m.clone());

        let result =
            exec.execute(&catalog, &Target::default(), "core", "", ExecutionContext::default(), false).await.unwrap();

        match result {
            ExecuteResult::Ran(outcome) => assert_eq!(outcome.applied.len(), 1),
            ExecuteResult::Queued { .. } => panic!("expected a synchronous result"),
        }
    }
}
