use crate::catalog::Catalog;
use crate::model::{HistoryFilter, ScannedMigration};
use crate::state::StateStore;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One reconciliation outcome for a single migration id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexEvent {
    /// Present in the catalog, absent from the meta-DB's scanned list.
    Added(String),
    /// Present in both, but identifying metadata (schema/version/name/connection) drifted.
    Updated(String),
    /// Present in the meta-DB's scanned list, no longer present in the catalog.
    Removed(String),
}

/// Reconcile the in-memory [`Catalog`] (the filesystem's current state, as
/// of the last scan) against the meta-DB's denormalized scanned-migrations
/// table, applying Added/Updated/Removed to bring the latter in line.
pub async fn reindex(catalog: &Catalog, state: &StateStore) -> Result<Vec<ReindexEvent>, sqlx::Error> {
    let current = catalog.get_all();
    let scanned = state.list(&HistoryFilter::default()).await?;
    let scanned_by_id: HashMap<String, ScannedMigration> =
        scanned.into_iter().map(|s| (s.migration_id.clone(), s)).collect();
    let current_ids: HashSet<String> = current.iter().map(|m| m.canonical_id()).collect();

    let mut events = Vec::new();

    for migration in &current {
        let id = migration.canonical_id();
        match scanned_by_id.get(&id) {
            None => {
                state.register_scanned(&ScannedMigration::from_migration(migration, None)).await?;
                events.push(ReindexEvent::Added(id));
            }
            Some(existing) => {
                if existing.differs_from(migration) {
                    state
                        .update_info(&ScannedMigration::from_migration(migration, existing.last_status))
                        .await?;
                    events.push(ReindexEvent::Updated(id));
                }
            }
        }
    }

    for id in scanned_by_id.keys() {
        if !current_ids.contains(id) {
            state.delete(id).await?;
            events.push(ReindexEvent::Removed(id.clone()));
        }
    }

    Ok(events)
}

fn log_events(events: &[ReindexEvent]) {
    for event in events {
        match event {
            ReindexEvent::Added(id) => tracing::info!("reindex: added {id}"),
            ReindexEvent::Updated(id) => tracing::info!("reindex: updated {id}"),
            ReindexEvent::Removed(id) => tracing::warn!("reindex: removed {id}"),
        }
    }
}

/// Reconcile once at startup, then keep reconciling every `interval` until
/// `token` is cancelled.
pub async fn run(catalog: &Catalog, state: &StateStore, interval: Duration, token: CancellationToken) {
    match reindex(catalog, state).await {
        Ok(events) => log_events(&events),
        Err(e) => tracing::error!("initial reindex failed: {e}"),
    }

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("reindexer stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                match reindex(catalog, state).await {
                    Ok(events) => log_events(&events),
                    Err(e) => tracing::error!("reindex failed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Backend;
    use crate::state::MemoryStateTracker;
    use crate::model::Migration;

    fn migration(name: &str, schema: &str) -> Migration {
        Migration {
            version: "20240101120000".into(),
            name: name.into(),
            backend: Backend::Postgresql,
            connection: "core".into(),
            schema: schema.into(),
            table: None,
            up_payload: vec![],
            down_payload: None,
            dependencies: vec![],
            structured_dependencies: vec![],
        }
    }

    #[tokio::test]
    async fn new_migration_is_reported_as_added() {
        let catalog = Catalog::new();
        catalog.register(migration("create_users", "public"));
        let state = StateStore::Memory(MemoryStateTracker::new());

        let events = reindex(&catalog, &state).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ReindexEvent::Added(_)));
    }

    #[tokio::test]
    async fn schema_drift_is_reported_as_updated() {
        let catalog = Catalog::new();
        let m = migration("create_users", "public");
        catalog.register(m.clone());
        let state = StateStore::Memory(MemoryStateTracker::new());
        reindex(&catalog, &state).await.unwrap();

        let mut drifted = m.clone();
        drifted.schema = "tenant_a".into();
        catalog.register(drifted);

        let events = reindex(&catalog, &state).await.unwrap();
        assert_eq!(events, vec![ReindexEvent::Updated(m.canonical_id())]);
    }

    #[tokio::test]
    async fn deleted_migration_is_reported_as_removed() {
        let catalog = Catalog::new();
        let m = migration("create_users", "public");
        catalog.register(m.clone());
        let state = StateStore::Memory(MemoryStateTracker::new());
        reindex(&catalog, &state).await.unwrap();

        catalog.remove(&m.canonical_id());
        let events = reindex(&catalog, &state).await.unwrap();
        assert_eq!(events, vec![ReindexEvent::Removed(m.canonical_id())]);
    }
}
