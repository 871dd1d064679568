use super::backend::Backend;
use std::fmt;

/// Whether a [`Dependency`] target names another migration by its `name`
/// or by its `version`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DependencyTargetType {
    Name,
    Version,
}

impl Default for DependencyTargetType {
    fn default() -> Self {
        DependencyTargetType::Name
    }
}

/// A declaration that another migration must be applied before this one,
/// optionally scoped to a connection/schema and carrying schema/table
/// preconditions. `Simple(name)` dependencies (the legacy, backward
/// compatible form) are lifted into this shape at resolution time via
/// [`Dependency::simple`]: resolution treats both uniformly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub connection: Option<String>,
    pub schema: Option<String>,
    pub target: String,
    pub target_type: DependencyTargetType,
    pub requires_table: Option<String>,
    pub requires_schema: Option<String>,
}

impl Dependency {
    /// Build the structured equivalent of a simple string dependency:
    /// `Simple(n)` is equivalent to `Structured{target:n, target_type:name}`.
    pub fn simple(name: impl Into<String>) -> Self {
        Dependency {
            connection: None,
            schema: None,
            target: name.into(),
            target_type: DependencyTargetType::Name,
            requires_table: None,
            requires_schema: None,
        }
    }

    /// True if this dependency carries no preconditions beyond "applied" —
    /// i.e. was lifted from the simple string form.
    pub fn is_simple(&self) -> bool {
        self.connection.is_none()
            && self.schema.is_none()
            && self.requires_table.is_none()
            && self.requires_schema.is_none()
            && self.target_type == DependencyTargetType::Name
    }

    /// A compact, human-readable description used in validator failures.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.target.clone()];
        if let Some(c) = &self.connection {
            parts.push(format!("connection={c}"));
        }
        if let Some(s) = &self.schema {
            parts.push(format!("schema={s}"));
        }
        format!("dep({})", parts.join(", "))
    }
}

/// A versioned, named, opaque change to a backend, with an optional inverse.
///
/// Identity is the tuple `(version, name, backend, connection)`; re-registering
/// the same identity in the catalog replaces the previous value silently.
#[derive(Clone, Debug)]
pub struct Migration {
    pub version: String,
    pub name: String,
    pub backend: Backend,
    pub connection: String,
    /// Empty means "caller supplies at execute time" (dynamic schema fan-out).
    pub schema: String,
    pub table: Option<String>,
    pub up_payload: Vec<u8>,
    pub down_payload: Option<Vec<u8>>,
    /// Simple, backward-compatible dependency names.
    pub dependencies: Vec<String>,
    pub structured_dependencies: Vec<Dependency>,
}

impl Migration {
    /// Canonical identity string: `{version}_{name}_{backend}_{connection}`.
    pub fn canonical_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.version,
            self.name,
            self.backend.tag(),
            self.connection
        )
    }

    /// All dependencies, simple and structured, lifted to the structured shape.
    pub fn all_dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = self
            .dependencies
            .iter()
            .map(|name| Dependency::simple(name.clone()))
            .collect();
        deps.extend(self.structured_dependencies.iter().cloned());
        deps
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_id())
    }
}

/// Errors constructing or parsing migration identity.
#[derive(Debug)]
pub struct VersionError(pub String);

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid migration version '{}': expected 14 decimal digits (YYYYMMDDHHMMSS)", self.0)
    }
}

impl std::error::Error for VersionError {}

/// Validate that `version` matches `^\d{14}$`.
pub fn validate_version(version: &str) -> Result<(), VersionError> {
    if version.len() == 14 && version.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(VersionError(version.to_string()))
    }
}

/// Parse a `{version}_{name}` filename stem (without extension) into its parts.
/// `version` must be exactly 14 digits; `name` is whatever follows the first
/// underscore run.
pub fn parse_version_and_name(stem: &str) -> Result<(String, String), VersionError> {
    let (version, rest) = stem.split_once('_').ok_or_else(|| VersionError(stem.to_string()))?;
    validate_version(version)?;
    if rest.is_empty() {
        return Err(VersionError(stem.to_string()));
    }
    Ok((version.to_string(), rest.to_string()))
}

/// Accepts the canonical id as well as the legacy shapes:
///   - `{version}_{name}`
///   - `{connection}_{version}_{name}`
///   - `{schema}_{connection}_{version}_{name}`
///   - a sanitized-schema variant of the above (schema with `/` replaced by `_`)
///
/// Matching is driven off each migration's own `(version, name, connection)`
/// fields rather than re-splitting the canonical id string, since `name` and
/// `connection` may themselves contain underscores. Returns the canonical id
/// of the first match, trying the canonical form first.
pub fn resolve_migration_id<'a>(
    raw_id: &str,
    migrations: impl Iterator<Item = &'a Migration>,
) -> Option<String> {
    let migrations: Vec<&Migration> = migrations.collect();

    // 1. Canonical form: exact match.
    if let Some(found) = migrations.iter().find(|m| m.canonical_id() == raw_id) {
        return Some(found.canonical_id());
    }

    // 2. Legacy shapes, evaluated per migration using its known fields.
    for m in &migrations {
        let version_name = format!("{}_{}", m.version, m.name);
        if raw_id == version_name {
            return Some(m.canonical_id());
        }

        let connection_version_name = format!("{}_{version_name}", m.connection);
        if raw_id == connection_version_name {
            return Some(m.canonical_id());
        }

        // `{schema}_{connection}_{version}_{name}` and its sanitized variant
        // (schema with `/` replaced by `_`): the schema prefix is
        // caller-supplied and opaque here, so match by suffix.
        let suffix = format!("_{connection_version_name}");
        if raw_id.ends_with(&suffix) && raw_id.len() > suffix.len() {
            return Some(m.canonical_id());
        }
    }

    None
}

/// Schema-prefixed id used for per-schema execution tracking.
pub fn schema_prefixed_id(schema: &str, canonical_id: &str) -> String {
    format!("{schema}_{canonical_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(version: &str, name: &str, backend: Backend, connection: &str) -> Migration {
        Migration {
            version: version.to_string(),
            name: name.to_string(),
            backend,
            connection: connection.to_string(),
            schema: String::new(),
            table: None,
            up_payload: vec![],
            down_payload: None,
            dependencies: vec![],
            structured_dependencies: vec![],
        }
    }

    #[test]
    fn canonical_id_matches_spec_shape() {
        let m = sample("20240101120000", "create_users", Backend::Postgresql, "core");
        assert_eq!(m.canonical_id(), "20240101120000_create_users_postgresql_core");
    }

    #[test]
    fn validate_version_requires_14_digits() {
        assert!(validate_version("20240101120000").is_ok());
        assert!(validate_version("2024010112000").is_err());
        assert!(validate_version("2024010112000a").is_err());
    }

    #[test]
    fn parse_version_and_name_splits_on_first_underscore() {
        let (v, n) = parse_version_and_name("20240101120000_create_users").unwrap();
        assert_eq!(v, "20240101120000");
        assert_eq!(n, "create_users");
    }

    #[test]
    fn parse_version_and_name_rejects_bad_version() {
        assert!(parse_version_and_name("bad_name").is_err());
    }

    #[test]
    fn simple_dependency_is_simple() {
        let d = Dependency::simple("create_users");
        assert!(d.is_simple());
    }

    #[test]
    fn structured_dependency_is_not_simple() {
        let d = Dependency {
            requires_table: Some("users".into()),
            ..Dependency::simple("create_users")
        };
        assert!(!d.is_simple());
    }

    #[test]
    fn resolve_migration_id_accepts_canonical() {
        let m = sample("20240101120000", "create_users", Backend::Postgresql, "core");
        let found = resolve_migration_id("20240101120000_create_users_postgresql_core", std::iter::once(&m));
        assert_eq!(found.as_deref(), Some("20240101120000_create_users_postgresql_core"));
    }

    #[test]
    fn resolve_migration_id_accepts_version_and_name() {
        let m = sample("20240101120000", "create_users", Backend::Postgresql, "core");
        let found = resolve_migration_id("20240101120000_create_users", std::iter::once(&m));
        assert_eq!(found.as_deref(), Some("20240101120000_create_users_postgresql_core"));
    }

    #[test]
    fn resolve_migration_id_accepts_connection_prefixed() {
        let m = sample("20240101120000", "create_users", Backend::Postgresql, "core");
        let found = resolve_migration_id("core_20240101120000_create_users", std::iter::once(&m));
        assert_eq!(found.as_deref(), Some("20240101120000_create_users_postgresql_core"));
    }

    #[test]
    fn resolve_migration_id_accepts_schema_prefixed() {
        let m = sample("20240101120000", "create_users", Backend::Postgresql, "core");
        let found = resolve_migration_id("tenant_a_core_20240101120000_create_users", std::iter::once(&m));
        assert_eq!(found.as_deref(), Some("20240101120000_create_users_postgresql_core"));
    }

    #[test]
    fn resolve_migration_id_rejects_unknown() {
        let m = sample("20240101120000", "create_users", Backend::Postgresql, "core");
        let found = resolve_migration_id("nonexistent", std::iter::once(&m));
        assert_eq!(found, None);
    }

    #[test]
    fn schema_prefixed_id_matches_spec() {
        assert_eq!(
            schema_prefixed_id("s", "20240101120000_create_users_postgresql_core"),
            "s_20240101120000_create_users_postgresql_core"
        );
    }
}
