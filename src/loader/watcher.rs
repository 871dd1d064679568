use super::scanner::scan_root;
use crate::catalog::Catalog;
use crate::model::ScannedMigration;
use crate::state::StateStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Periodically rescans the migration root and registers discovered
/// migrations into a [`Catalog`]. Keeps a `path -> mtime` map so
/// a future incremental scan can skip files that have not changed; the
/// current implementation still re-reads every file each pass since the
/// scanner itself is cheap and stateless, but the bookkeeping is kept
/// current regardless.
pub struct Watcher {
    root: PathBuf,
    interval: Duration,
    seen: HashMap<PathBuf, SystemTime>,
}

impl Watcher {
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Watcher { root: root.into(), interval, seen: HashMap::new() }
    }

    /// Run one scan pass, registering any migrations found into `catalog`.
    /// Returns the migrations registered this pass plus scan errors
    /// (malformed filenames, garbled sidecar JSON, an unreadable directory
    /// entry) without short-circuiting on the first one.
    pub fn rescan_once(&mut self, catalog: &Catalog) -> std::io::Result<RescanOutcome> {
        let report = scan_root(&self.root)?;
        let errors = report.errors.iter().map(|e| e.to_string()).collect();

        let migrations = report.migrations;
        for migration in &migrations {
            catalog.register(migration.clone());
        }

        for path in walk_files(&self.root)? {
            if let Ok(metadata) = std::fs::metadata(&path) {
                if let Ok(modified) = metadata.modified() {
                    self.seen.insert(path, modified);
                }
            }
        }

        Ok(RescanOutcome { migrations, errors })
    }

    /// [`Self::rescan_once`], additionally calling `state.register_scanned`
    /// for every migration discovered this pass when a
    /// state tracker is attached.
    pub async fn rescan_once_with_state(
        &mut self,
        catalog: &Catalog,
        state: Option<&StateStore>,
    ) -> std::io::Result<Vec<String>> {
        let outcome = self.rescan_once(catalog)?;
        if let Some(state) = state {
            for migration in &outcome.migrations {
                let scanned = ScannedMigration::from_migration(migration, None);
                if let Err(e) = state.register_scanned(&scanned).await {
                    tracing::warn!("register_scanned failed for {}: {e}", migration.canonical_id());
                }
            }
        }
        Ok(outcome.errors)
    }

    /// Scan immediately, then keep rescanning every `interval` until `token`
    /// is cancelled.
    pub async fn run(&mut self, catalog: &Catalog, state: Option<&StateStore>, token: CancellationToken) {
        match self.rescan_once_with_state(catalog, state).await {
            Ok(errors) => log_scan_errors(&errors),
            Err(e) => tracing::error!("initial migration scan failed: {e}"),
        }

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("migration watcher stopping");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    match self.rescan_once_with_state(catalog, state).await {
                        Ok(errors) => log_scan_errors(&errors),
                        Err(e) => tracing::error!("migration rescan failed: {e}"),
                    }
                }
            }
        }
    }
}

/// Outcome of one [`Watcher::rescan_once`] pass.
pub struct RescanOutcome {
    pub migrations: Vec<crate::model::Migration>,
    pub errors: Vec<String>,
}

fn log_scan_errors(errors: &[String]) {
    for e in errors {
        tracing::warn!("migration scan error: {e}");
    }
}

fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !root.is_dir() {
        return Ok(out);
    }
    for backend_entry in std::fs::read_dir(root)? {
        let backend_path = backend_entry?.path();
        if !backend_path.is_dir() {
            continue;
        }
        for connection_entry in std::fs::read_dir(&backend_path)? {
            let connection_path = connection_entry?.path();
            if !connection_path.is_dir() {
                continue;
            }
            for file_entry in std::fs::read_dir(&connection_path)? {
                let path = file_entry?.path();
                if path.is_file() {
                    out.push(path);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rescan_once_registers_discovered_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("postgresql/core")).unwrap();
        fs::write(
            root.join("postgresql/core/20240101120000_create_users.up.sql"),
            "CREATE TABLE users();",
        )
        .unwrap();

        let catalog = Catalog::new();
        let mut watcher = Watcher::new(root, Duration::from_secs(60));
        let outcome = watcher.rescan_once(&catalog).unwrap();

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.migrations.len(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn run_stops_promptly_on_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = Watcher::new(dir.path(), Duration::from_secs(3600));
        let token = CancellationToken::new();
        let token_clone = token.clone();

        token.cancel();
        let handle = tokio::spawn(async move {
            let catalog = Catalog::new();
            watcher.run(&catalog, None, token_clone).await
        });
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn rescan_with_state_registers_scanned_migrations() {
        use crate::state::MemoryStateTracker;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("postgresql/core")).unwrap();
        fs::write(
            root.join("postgresql/core/20240101120000_create_users.up.sql"),
            "CREATE TABLE users();",
        )
        .unwrap();

        let catalog = Catalog::new();
        let state = StateStore::Memory(MemoryStateTracker::new());
        let mut watcher = Watcher::new(root, Duration::from_secs(60));
        let errors = watcher.rescan_once_with_state(&catalog, Some(&state)).await.unwrap();

        assert!(errors.is_empty());
        let scanned = state.list(&crate::model::HistoryFilter::default()).await.unwrap();
        assert_eq!(scanned.len(), 1);
    }
}
