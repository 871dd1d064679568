use crate::model::{Dependency, Migration};
use crate::resolver::resolve_target;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Snapshot of backend/state-tracker facts the validator checks preconditions
/// against. Gathering these facts means I/O; the validator
/// itself stays synchronous and pure so it can be unit tested without a
/// live backend, with the executor responsible for collecting the facts
/// beforehand.
#[derive(Default)]
pub struct ValidationFacts {
    /// Schema-prefixed or canonical ids already recorded as applied.
    pub applied_ids: HashSet<String>,
    /// `(connection, schema)` pairs known to exist.
    pub existing_schemas: HashSet<(String, String)>,
    /// `(connection, schema, table)` triples known to exist.
    pub existing_tables: HashSet<(String, String, String)>,
}

#[derive(Debug)]
pub struct ValidationError {
    pub migration_id: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.migration_id, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Priority chain for the schema a dependency's preconditions are checked
/// against: an explicit `requires_schema` wins outright; absent
/// that, the dependency's own `schema` scope; absent that, the dependent
/// migration's declared schema; absent that, the schema this batch is
/// actually executing against.
fn resolve_dependency_schema(dep: &Dependency, migration: &Migration, execution_schema: &str) -> String {
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

/// Validate one migration's preconditions against `facts`, skipping the
/// "already applied" check for any dependency target that is itself part of
/// `in_batch_ids` — the resolver has already guaranteed it runs earlier in
/// this same batch, so requiring it to already be recorded in the state
/// tracker would reject every multi-migration batch on its first run.
pub fn validate_migration(
    migration: &Migration,
    execution_schema: &str,
    in_batch_ids: &HashSet<String>,
    by_id: &HashMap<String, Migration>,
    facts: &ValidationFacts,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for dep in migration.all_dependencies() {
        let targets = resolve_target(migration, &dep, by_id);
        if targets.is_empty() {
            errors.push(ValidationError {
                migration_id: migration.canonical_id(),
                message: format!("missing dependency target {}", dep.describe()),
            });
            continue;
        }

        let dep_schema = resolve_dependency_schema(&dep, migration, execution_schema);

        for target in &targets {
            let target_id = target.canonical_id();
            if !in_batch_ids.contains(&target_id) {
                let schema_prefixed = crate::model::schema_prefixed_id(&dep_schema, &target_id);
                let applied = facts.applied_ids.contains(&schema_prefixed) || facts.applied_ids.contains(&target_id);
                if !applied {
                    errors.push(ValidationError {
                        migration_id: migration.canonical_id(),
                        message: format!("dependency {} is not applied in schema '{dep_schema}'", dep.describe()),
                    });
                }
            }

            // Skip when the dep's own migration is in this batch: it will
            // create the table itself.
            if let Some(table) = &dep.requires_table {
                if !in_batch_ids.contains(&target_id) {
                    let key = (target.connection.clone(), dep_schema.clone(), table.clone());
                    if !facts.existing_tables.contains(&key) {
                        errors.push(ValidationError {
                            migration_id: migration.canonical_id(),
                            message: format!("required table '{table}' does not exist in schema '{dep_schema}'"),
                        });
                    }
                }
            }
        }

        if let Some(schema) = &dep.requires_schema {
            let key = (migration.connection.clone(), schema.clone());
            if !facts.existing_schemas.contains(&key) {
                errors.push(ValidationError {
                    migration_id: migration.canonical_id(),
                    message: format!("required schema '{schema}' does not exist"),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate every migration in an already-ordered batch, accumulating every
/// failure instead of stopping at the first: a caller wants the
/// full precondition report before deciding whether to proceed.
pub fn validate_batch(
    ordered: &[Migration],
    execution_schema: &str,
    facts: &ValidationFacts,
) -> Result<(), Vec<ValidationError>> {
    let by_id: HashMap<String, Migration> = ordered.iter().map(|m| (m.canonical_id(), m.clone())).collect();
    let in_batch_ids: HashSet<String> = by_id.keys().cloned().collect();

    let mut errors = Vec::new();
    for migration in ordered {
        if let Err(mut e) = validate_migration(migration, execution_schema, &in_batch_ids, &by_id, facts) {
            errors.append(&mut e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
