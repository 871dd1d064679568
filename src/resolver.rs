use crate::model::{Dependency, DependencyTargetType, Migration};
use std::collections::HashMap;
use std::fmt;

/// Failures building or ordering the dependency graph.
#[derive(Debug)]
pub enum ResolverError {
    /// A path of canonical ids, first and last equal, describing the cycle.
    Cycle(Vec<String>),
    UnknownDependency { migration: String, dependency: String },
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::Cycle(path) => write!(f, "dependency cycle: {}", path.join(" -> ")),
            ResolverError::UnknownDependency { migration, dependency } => {
                write!(f, "migration '{migration}' depends on unresolved target {dependency}")
            }
        }
    }
}

impl std::error::Error for ResolverError {}

pub struct DependencyGraph {
    /// canonical id -> ids of migrations that must run before it.
    pub edges: HashMap<String, Vec<String>>,
}

/// Resolve one dependency declaration against a candidate set. An explicit
/// `connection` on the dependency restricts the search to it; otherwise the
/// dependent migration's own connection is tried first and, if nothing
/// matches there, the search expands across every connection present in
/// `by_id` — this is what lets a
/// relational migration depend on a KV migration by name without the
/// author spelling out the target connection.
pub(crate) fn resolve_target<'a>(
    dependent: &Migration,
    dep: &Dependency,
    by_id: &'a HashMap<String, Migration>,
) -> Vec<&'a Migration> {
    let matches_target = |m: &Migration| -> bool {
        let name_or_version_matches = match dep.target_type {
            DependencyTargetType::Name => m.name == dep.target,
            DependencyTargetType::Version => m.version == dep.target,
        };
        if !name_or_version_matches {
            return false;
        }
        if let Some(schema) = &dep.schema {
            if &m.schema != schema {
                return false;
            }
        }
        true
    };

    if let Some(connection) = &dep.connection {
        return by_id.values().filter(|m| &m.connection == connection && matches_target(m)).collect();
    }

    let same_connection: Vec<&Migration> = by_id
        .values()
        .filter(|m| m.connection == dependent.connection && matches_target(m))
        .collect();
    if !same_connection.is_empty() {
        return same_connection;
    }

    by_id.values().filter(|m| matches_target(m)).collect()
}

fn build_graph(migrations: &[Migration]) -> Result<DependencyGraph, ResolverError> {
    let by_id: HashMap<String, Migration> = migrations.iter().map(|m| (m.canonical_id(), m.clone())).collect();
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();

    for m in migrations {
        let id = m.canonical_id();
        let mut prerequisites = Vec::new();
        for dep in m.all_dependencies() {
            let targets = resolve_target(m, &dep, &by_id);
            if targets.is_empty() {
                return Err(ResolverError::UnknownDependency { migration: id, dependency: dep.describe() });
            }
            for target in targets {
                let target_id = target.canonical_id();
                if target_id != id && !prerequisites.contains(&target_id) {
                    prerequisites.push(target_id);
                }
            }
        }
        edges.insert(id, prerequisites);
    }

    Ok(DependencyGraph { edges })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn detect_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let mut marks: HashMap<String, Mark> =
        graph.edges.keys().map(|k| (k.clone(), Mark::Unvisited)).collect();
    let mut stack: Vec<String> = Vec::new();

    fn visit(
        node: &str,
        graph: &DependencyGraph,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        match marks.get(node).copied() {
            Some(Mark::Done) => return None,
            Some(Mark::InProgress) => {
                let mut cycle = stack.clone();
                cycle.push(node.to_string());
                let start = cycle.iter().position(|n| n == node).unwrap_or(0);
                return Some(cycle[start..].to_vec());
            }
            _ => {}
        }

        marks.insert(node.to_string(), Mark::InProgress);
        stack.push(node.to_string());

        if let Some(deps) = graph.edges.get(node) {
            for dep in deps {
                if let Some(cycle) = visit(dep, graph, marks, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        marks.insert(node.to_string(), Mark::Done);
        None
    }

    let nodes: Vec<String> = graph.edges.keys().cloned().collect();
    for node in &nodes {
        if let Some(cycle) = visit(node, graph, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn sort_key<'a>(id: &str, by_id: &HashMap<String, &'a Migration>) -> (String, String) {
    match by_id.get(id) {
        Some(m) => (m.version.clone(), id.to_string()),
        None => (String::new(), id.to_string()),
    }
}

fn pop_smallest(ready: &mut Vec<String>, by_id: &HashMap<String, &Migration>) -> Option<String> {
    if ready.is_empty() {
        return None;
    }
    let mut best = 0;
    for i in 1..ready.len() {
        if sort_key(&ready[i], by_id) < sort_key(&ready[best], by_id) {
            best = i;
        }
    }
    Some(ready.remove(best))
}

/// Kahn's algorithm with a deterministic tie-break: among all currently
/// ready nodes, the one with the smallest `(version, canonical_id)` runs
/// next. Given a graph already known to be acyclic, this always consumes
/// every node.
fn topological_order(migrations: &[Migration], graph: &DependencyGraph) -> Vec<String> {
    let by_id: HashMap<String, &Migration> = migrations.iter().map(|m| (m.canonical_id(), m)).collect();

    let mut indegree: HashMap<String, usize> =
        graph.edges.iter().map(|(id, deps)| (id.clone(), deps.len())).collect();

    let mut successors: HashMap<String, Vec<String>> = HashMap::new();
    for (id, deps) in &graph.edges {
        for dep in deps {
            successors.entry(dep.clone()).or_default().push(id.clone());
        }
    }

    let mut ready: Vec<String> = indegree.iter().filter(|(_, &d)| d == 0).map(|(k, _)| k.clone()).collect();
    let mut order = Vec::with_capacity(migrations.len());

    while let Some(next) = pop_smallest(&mut ready, &by_id) {
        if let Some(succs) = successors.get(&next) {
            for succ in succs {
                if let Some(d) = indegree.get_mut(succ) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(succ.clone());
                    }
                }
            }
        }
        order.push(next);
    }

    order
}

fn version_ascending_order(migrations: &[Migration]) -> Vec<String> {
    let by_id: HashMap<String, &Migration> = migrations.iter().map(|m| (m.canonical_id(), m)).collect();
    let mut ids: Vec<String> = migrations.iter().map(|m| m.canonical_id()).collect();
    ids.sort_by(|a, b| sort_key(a, &by_id).cmp(&sort_key(b, &by_id)));
    ids
}

/// Resolve a dependency-respecting execution order for `migrations`.
///
/// If every dependency present is a simple, legacy-form name (no connection
/// scoping or preconditions) and the graph cannot be built because a target
/// is missing from this batch, resolution degrades to a plain ascending
/// version sort rather than failing outright — the simple form was never a
/// hard requirement, only an ordering hint; strict failure is reserved for
/// structured dependencies and for cycles.
pub fn resolve_order(migrations: &[Migration]) -> Result<Vec<String>, ResolverError> {
    let only_simple_dependencies =
        migrations.iter().all(|m| m.all_dependencies().iter().all(Dependency::is_simple));

    match build_graph(migrations) {
        Ok(graph) => {
            if let Some(cycle) = detect_cycle(&graph) {
                return Err(ResolverError::Cycle(cycle));
            }
            Ok(topological_order(migrations, &graph))
        }
        Err(err @ ResolverError::UnknownDependency { .. }) if only_simple_dependencies => {
            tracing::warn!("dependency resolution fell back to version-ascending order: {err}");
            Ok(version_ascending_order(migrations))
        }
        Err(err) => Err(err),
    }
}

/// Grow `selected` to a fixed point: repeatedly pull in, from `catalog_all`,
/// any migration that a currently-included migration depends on but that
/// isn't included yet — including migrations on other connections. Used when a caller asks to execute a
/// target-filtered subset of the catalog but some of that subset's
/// dependencies live outside the filter.
pub fn expand_with_pending_dependencies(selected: Vec<Migration>, catalog_all: &[Migration]) -> Vec<Migration> {
    let all_by_id: HashMap<String, Migration> =
        catalog_all.iter().map(|m| (m.canonical_id(), m.clone())).collect();
    let mut included: HashMap<String, Migration> =
        selected.into_iter().map(|m| (m.canonical_id(), m)).collect();

    loop {
        let mut added_any = false;
        let current: Vec<Migration> = included.values().cloned().collect();

        for m in &current {
            for dep in m.all_dependencies() {
                for target in resolve_target(m, &dep, &all_by_id) {
                    let target_id = target.canonical_id();
                    if !included.contains_key(&target_id) {
                        included.insert(target_id, target.clone());
                        added_any = true;
                    }
                }
            }
        }

        if !added_any {
            break;
        }
    }

    included.into_values().collect()
}
