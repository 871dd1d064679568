use crate::catalog::Catalog;
use crate::executor::Executor;
use crate::model::{ExecutionContext, ExecutionMethod};
use crate::queue::Job;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

/// Consumes jobs off the async dispatch queue and runs them through the
/// executor. There is no redelivery/ack protocol to speak of: the
/// in-process channel queue drops a job the moment it's received, so a
/// failed job is logged and its failure recorded in the meta-DB by the
/// executor, not retried here — a real message bus sitting in front of this
/// crate would own redelivery.
pub struct Worker {
    receiver: Receiver<Job>,
}

impl Worker {
    pub fn new(receiver: Receiver<Job>) -> Self {
        Worker { receiver }
    }

    pub async fn run(&mut self, catalog: &Catalog, executor: &Executor, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("worker stopping");
                    return;
                }
                job = self.receiver.recv() => {
                    match job {
                        Some(job) => self.handle(catalog, executor, job).await,
                        None => {
                            tracing::info!("worker queue closed, stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Process exactly one already-enqueued job, if any, without starting
    /// the run loop. Used by one-shot callers that publish a single job and
    /// want to drive it through to completion inline.
    pub async fn run_one(&mut self, catalog: &Catalog, executor: &Executor) -> bool {
        match self.receiver.recv().await {
            Some(job) => {
                self.handle(catalog, executor, job).await;
                true
            }
            None => false,
        }
    }

    async fn handle(&self, catalog: &Catalog, executor: &Executor, job: Job) {
        let context = ExecutionContext {
            executed_by: "worker".to_string(),
            method: ExecutionMethod::Worker,
            context: job.metadata.clone().unwrap_or_default(),
        };
        match executor.execute_sync(catalog, &job.target, &job.schema, context, job.dry_run).await {
            Ok(outcome) if outcome.success => {
                tracing::info!("job {} completed: {} applied, {} skipped", job.id, outcome.applied.len(), outcome.skipped.len());
            }
            Ok(outcome) => {
                tracing::error!("job {} completed with errors: {}", job.id, outcome.errors.join("; "));
            }
            Err(e) => tracing::error!("job {} failed: {e}", job.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryEngine;
    use crate::backend::EngineBackend;
    use crate::model::{Backend, Migration, Target};
    use crate::queue::{ChannelQueue, Queue};
    use crate::state::{MemoryStateTracker, StateStore};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn migration() -> Migration {
        Migration {
            version: "20240101120000".into(),
            name: "create_users".into(),
            backend: Backend::Postgresql,
            connection: "core".into(),
            schema: "public".into(),
            table: None,
            up_payload: b"CREATE TABLE t();".to_vec(),
            down_payload: None,
            dependencies: vec![],
            structured_dependencies: vec![],
        }
    }

    #[tokio::test]
    async fn worker_executes_published_jobs() {
        let catalog = Catalog::new();
        let m = migration();
        catalog.register(m.clone());

        let mut backends = HashMap::new();
        backends.insert("core".to_string(), Mutex::new(EngineBackend::Memory(MemoryEngine::new())));
        let executor = Executor::new(backends, StateStore::Memory(MemoryStateTracker::new()));

        let (queue, receiver) = ChannelQueue::new(4);
        let mut worker = Worker::new(receiver);
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let target = Target { connection: Some("core".into()), version: Some(m.version.clone()), ..Target::default() };
        queue.publish(Job::new(target, "core", "public", false, None)).await.unwrap();

        let handle = tokio::spawn(async move { worker.run(&catalog, &executor, token_clone).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_one_processes_a_single_queued_job_deterministically() {
        let catalog = Catalog::new();
        let m = migration();
        catalog.register(m.clone());

        let mut backends = HashMap::new();
        backends.insert("core".to_string(), Mutex::new(EngineBackend::Memory(MemoryEngine::new())));
        let executor = Executor::new(backends, StateStore::Memory(MemoryStateTracker::new()));

        let (queue, receiver) = ChannelQueue::new(4);
        let mut worker = Worker::new(receiver);

        let target = Target { connection: Some("core".into()), version: Some(m.version.clone()), ..Target::default() };
        queue.publish(Job::new(target, "core", "public", false, None)).await.unwrap();

        assert!(worker.run_one(&catalog, &executor).await);
    }
}
