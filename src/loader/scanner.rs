use crate::model::{Backend, Dependency, DependencyTargetType, Migration};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One file (or sidecar) that failed to parse into a [`Migration`]. Does not
/// abort the rest of the scan: a single malformed migration must
/// not hide every other one from the catalog.
#[derive(Debug)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for ScanError {}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub migrations: Vec<Migration>,
    pub errors: Vec<ScanError>,
}

#[derive(Deserialize)]
struct DependencyDecl {
    target: String,
    #[serde(default)]
    target_type: Option<String>,
    #[serde(default)]
    connection: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    requires_table: Option<String>,
    #[serde(default)]
    requires_schema: Option<String>,
}

#[derive(Deserialize, Default)]
struct MigrationMeta {
    #[serde(default)]
    schema: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    structured_dependencies: Vec<DependencyDecl>,
}

enum Direction {
    Up,
    Down,
}

fn split_direction(file_name: &str, ext: &str) -> Option<(String, Direction)> {
    let up_suffix = format!(".up.{ext}");
    let down_suffix = format!(".down.{ext}");
    if let Some(stem) = file_name.strip_suffix(&up_suffix) {
        return Some((stem.to_string(), Direction::Up));
    }
    if let Some(stem) = file_name.strip_suffix(&down_suffix) {
        return Some((stem.to_string(), Direction::Down));
    }
    None
}

/// Walk `<root>/<backend>/<connection>/<version>_<name>.{up,down}.{ext}` and
/// assemble one [`Migration`] per distinct `(backend, connection, version, name)`
/// stem found, with an optional `{stem}.meta.json` sidecar supplying schema,
/// table and dependency declarations (migrations are opaque payload blobs,
/// so none of this is recovered by parsing the payload itself).
///
/// A directory entry that is a known backend tag is scanned; anything else
/// is reported as a [`ScanError`] rather than silently ignored, since an
/// operator typo in a connection/backend directory name should surface. A
/// stem with only a `.down` file (a scaffold an operator has started but not
/// finished) is skipped rather than erroring: it has nothing runnable yet.
pub fn scan_root(root: &Path) -> io::Result<ScanReport> {
    let mut report = ScanReport::default();
    if !root.is_dir() {
        return Ok(report);
    }

    for backend_entry in fs::read_dir(root)? {
        let backend_entry = backend_entry?;
        let backend_path = backend_entry.path();
        if !backend_path.is_dir() {
            continue;
        }
        let backend_name = backend_entry.file_name().to_string_lossy().to_string();
        let Some(backend) = Backend::parse(&backend_name) else {
            report.errors.push(ScanError {
                path: backend_path,
                message: format!("unknown backend directory '{backend_name}'"),
            });
            continue;
        };

        for connection_entry in fs::read_dir(&backend_path)? {
            let connection_entry = connection_entry?;
            let connection_path = connection_entry.path();
            if !connection_path.is_dir() {
                continue;
            }
            let connection = connection_entry.file_name().to_string_lossy().to_string();
            scan_connection_dir(&connection_path, backend, &connection, &mut report)?;
        }
    }

    Ok(report)
}

fn scan_connection_dir(
    dir: &Path,
    backend: Backend,
    connection: &str,
    report: &mut ScanReport,
) -> io::Result<()> {
    let mut stems: HashMap<String, (Option<PathBuf>, Option<PathBuf>)> = HashMap::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((stem, direction)) = split_direction(file_name, backend.payload_extension()) {
            let slot = stems.entry(stem).or_default();
            match direction {
                Direction::Up => slot.0 = Some(path),
                Direction::Down => slot.1 = Some(path),
            }
        }
    }

    for (stem, (up, down)) in stems {
        let Some(up_path) = up else {
            continue;
        };
        match build_migration(&stem, backend, connection, &up_path, down.as_deref()) {
            Ok(migration) => report.migrations.push(migration),
            Err(message) => report.errors.push(ScanError { path: up_path, message }),
        }
    }

    Ok(())
}

fn build_migration(
    stem: &str,
    backend: Backend,
    connection: &str,
    up_path: &Path,
    down_path: Option<&Path>,
) -> Result<Migration, String> {
    let (version, name) = crate::model::parse_version_and_name(stem).map_err(|e| e.to_string())?;

    let up_payload = fs::read(up_path).map_err(|e| e.to_string())?;
    let down_payload = down_path.map(fs::read).transpose().map_err(|e| e.to_string())?;

    let meta_path = up_path.with_file_name(format!("{stem}.meta.json"));
    let meta = if meta_path.is_file() {
        let text = fs::read_to_string(&meta_path).map_err(|e| e.to_string())?;
        serde_json::from_str::<MigrationMeta>(&text).map_err(|e| format!("invalid meta.json: {e}"))?
    } else {
        MigrationMeta::default()
    };

    let structured_dependencies = meta
        .structured_dependencies
        .into_iter()
        .map(|d| {
            let target_type = match d.target_type.as_deref() {
                Some("version") => DependencyTargetType::Version,
                _ => DependencyTargetType::Name,
            };
            Dependency {
                connection: d.connection,
                schema: d.schema,
                target: d.target,
                target_type,
                requires_table: d.requires_table,
                requires_schema: d.requires_schema,
            }
        })
        .collect();

    Ok(Migration {
        version,
        name,
        backend,
        connection: connection.to_string(),
        schema: meta.schema,
        table: meta.table,
        up_payload,
        down_payload,
        dependencies: meta.dependencies,
        structured_dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn scans_a_single_postgresql_migration() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("postgresql/core/20240101120000_create_users.up.sql"), "CREATE TABLE users();");
        write(&root.join("postgresql/core/20240101120000_create_users.down.sql"), "DROP TABLE users;");

        let report = scan_root(root).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.migrations.len(), 1);
        let m = &report.migrations[0];
        assert_eq!(m.version, "20240101120000");
        assert_eq!(m.name, "create_users");
        assert_eq!(m.connection, "core");
        assert_eq!(m.down_payload.as_deref(), Some("DROP TABLE users;".as_bytes()));
    }

    #[test]
    fn reads_sidecar_meta_json_for_schema_table_and_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("postgresql/core/20240101120000_create_users.up.sql"), "CREATE TABLE users();");
        write(
            &root.join("postgresql/core/20240101120000_create_users.meta.json"),
            r#"{"schema":"tenant_a","table":"users","dependencies":["bootstrap"]}"#,
        );

        let report = scan_root(root).unwrap();
        let m = &report.migrations[0];
        assert_eq!(m.schema, "tenant_a");
        assert_eq!(m.table.as_deref(), Some("users"));
        assert_eq!(m.dependencies, vec!["bootstrap".to_string()]);
    }

    #[test]
    fn down_only_scaffold_is_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("postgresql/core/20240101120000_create_users.down.sql"), "DROP TABLE users;");

        let report = scan_root(root).unwrap();
        assert!(report.migrations.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn unknown_backend_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("mongodb/core/20240101120000_create_users.up.sql"), "noop");

        let report = scan_root(root).unwrap();
        assert!(report.migrations.is_empty());
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn bad_version_in_filename_is_a_scan_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("postgresql/core/bad-version_create_users.up.sql"), "noop");

        let report = scan_root(root).unwrap();
        assert!(report.migrations.is_empty());
        assert_eq!(report.errors.len(), 1);
    }
}
