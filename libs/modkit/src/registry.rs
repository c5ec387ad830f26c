// modkit/src/registry.rs
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use crate::manifest::ModuleDescriptor;

/// The final, topo-sorted load order.
#[derive(Debug, Clone, Default)]
pub struct ModuleOrder {
    modules: Vec<ModuleDescriptor>, // topo-sorted, bootstrap first
    bootstrap: Option<String>,
    disabled: Vec<String>,
}

impl ModuleOrder {
    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id.as_str()).collect()
    }

    /// Id of the bootstrap module when it takes part in this run.
    pub fn bootstrap(&self) -> Option<&str> {
        self.bootstrap.as_deref()
    }

    pub fn is_bootstrap(&self, id: &str) -> bool {
        self.bootstrap.as_deref() == Some(id)
    }

    /// Ids excluded from scheduling because their manifest disables them.
    pub fn disabled(&self) -> &[String] {
        &self.disabled
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn into_modules(self) -> Vec<ModuleDescriptor> {
        self.modules
    }
}

/// Detect cycles in the dependency graph using DFS with path tracking.
/// Returns the cycle path if found, None otherwise.
fn detect_cycle_with_path(names: &[&str], adj: &[Vec<usize>]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White, // unvisited
        Gray,  // visiting (on current path)
        Black, // visited (finished)
    }

    fn dfs(
        node: usize,
        names: &[&str],
        adj: &[Vec<usize>],
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        colors[node] = Color::Gray;
        path.push(node);

        for &neighbor in &adj[node] {
            match colors[neighbor] {
                Color::Gray => {
                    // back edge: the cycle starts where `neighbor` entered the path
                    if let Some(cycle_start) = path.iter().position(|&n| n == neighbor) {
                        let mut cycle_path: Vec<String> = path[cycle_start..]
                            .iter()
                            .map(|&i| names[i].to_string())
                            .collect();
                        cycle_path.push(names[neighbor].to_string());
                        return Some(cycle_path);
                    }
                }
                Color::White => {
                    if let Some(cycle) = dfs(neighbor, names, adj, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
        None
    }

    let mut colors = vec![Color::White; names.len()];
    let mut path = Vec::new();

    for i in 0..names.len() {
        if colors[i] == Color::White {
            if let Some(cycle) = dfs(i, names, adj, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}

/// Resolve the load order.
///
/// Disabled descriptors are dropped. Dependencies on ids that are not scheduled are
/// logged and ignored. `bootstrap`, when present among the scheduled descriptors, is
/// pinned to position 0; everything else follows a topological order whose ready set
/// is ranked by (category, id).
pub fn order(
    descriptors: &[ModuleDescriptor],
    bootstrap: Option<&str>,
) -> Result<ModuleOrder, RegistryError> {
    // 1) uniqueness over everything we were handed, enabled or not
    let mut seen = HashSet::with_capacity(descriptors.len());
    for d in descriptors {
        if !seen.insert(d.id.as_str()) {
            return Err(RegistryError::DuplicateModuleId(d.id.clone()));
        }
    }

    let mut disabled = Vec::new();
    let active: Vec<&ModuleDescriptor> = descriptors
        .iter()
        .filter(|d| {
            if d.disabled {
                tracing::info!(module = %d.id, "module disabled by manifest, not scheduled");
                disabled.push(d.id.clone());
            }
            !d.disabled
        })
        .collect();

    let names: Vec<&str> = active.iter().map(|d| d.id.as_str()).collect();
    let idx: HashMap<&str, usize> = names.iter().enumerate().map(|(i, &n)| (n, i)).collect();

    // 2) bootstrap must be a root of the graph
    let boot = match bootstrap {
        Some(id) => match idx.get(id) {
            Some(&b) => {
                if !active[b].dependencies.is_empty() {
                    return Err(RegistryError::BootstrapHasDependencies {
                        module: id.to_string(),
                        dependencies: active[b].dependencies.iter().cloned().collect(),
                    });
                }
                Some(b)
            }
            None => {
                tracing::debug!(module = id, "bootstrap module not scheduled in this run");
                None
            }
        },
        None => None,
    };

    // 3) edges d -> n (dep before module)
    let mut adj = vec![Vec::<usize>::new(); names.len()];
    for (u, d) in active.iter().enumerate() {
        for dep in &d.dependencies {
            match idx.get(dep.as_str()) {
                Some(&v) => adj[v].push(u),
                None => tracing::warn!(
                    module = %d.id,
                    depends_on = %dep,
                    "dependency is not scheduled (unknown or disabled); ignoring edge"
                ),
            }
        }
    }

    // 4) cycle detection before any ordering decision
    if let Some(path) = detect_cycle_with_path(&names, &adj) {
        return Err(RegistryError::CycleDetected { path });
    }

    // 5) Kahn's algorithm with a (rank, id) ready queue
    let mut indeg = vec![0usize; names.len()];
    for adj_list in &adj {
        for &target in adj_list {
            indeg[target] += 1;
        }
    }

    let mut order = Vec::with_capacity(names.len());
    if let Some(b) = boot {
        order.push(b);
        for &w in &adj[b] {
            indeg[w] -= 1;
        }
    }

    let mut ready = BinaryHeap::new();
    for (i, &degree) in indeg.iter().enumerate() {
        if degree == 0 && Some(i) != boot {
            ready.push(Reverse((active[i].category.rank(), names[i], i)));
        }
    }

    while let Some(Reverse((_, _, u))) = ready.pop() {
        order.push(u);
        for &w in &adj[u] {
            indeg[w] -= 1;
            if indeg[w] == 0 {
                ready.push(Reverse((active[w].category.rank(), names[w], w)));
            }
        }
    }

    let modules: Vec<ModuleDescriptor> = order.into_iter().map(|i| active[i].clone()).collect();

    tracing::info!(
        modules = ?modules.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
        "Module dependency order resolved (topo)"
    );

    Ok(ModuleOrder {
        modules,
        bootstrap: boot.map(|b| names[b].to_string()),
        disabled,
    })
}

/// Structured errors for ordering.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate module id '{0}'")]
    DuplicateModuleId(String),
    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
    #[error("bootstrap module '{module}' must not declare dependencies, found: {}", dependencies.join(", "))]
    BootstrapHasDependencies {
        module: String,
        dependencies: Vec<String>,
    },
}
