//! Dependency graph and load-order resolution
//!
//! Plugins declare hard and soft dependencies by name. [`DependencyGraph`]
//! turns a batch of descriptors into nodes and edges, and [`sort`] runs
//! Kahn's algorithm over it to produce a [`LoadOrder`]: every dependency
//! before its dependents, with the plugins that cannot be loaded reported
//! individually instead of aborting the batch.
//!
//! Edges point from a dependent to its dependency. Kahn's algorithm
//! therefore emits plugins nobody depends on first, and the result is
//! reversed before it is returned.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use thiserror::Error;

use plinth_plugin_api::PluginDescriptor;

/// Why a plugin was left out of the load order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The file's descriptor could not be read
    #[error("Could not load '{}': {reason}", .file.display())]
    InvalidDescription { file: PathBuf, reason: String },

    /// Another file in the same batch already claimed this name
    #[error("Ambiguous plugin name '{name}' for files '{}' and '{}'", .file.display(), .existing.display())]
    DuplicateName {
        name: String,
        file: PathBuf,
        existing: PathBuf,
    },

    /// A hard dependency is not part of the batch
    #[error("Could not load '{plugin}': missing dependency '{dependency}'")]
    MissingDependency { plugin: String, dependency: String },

    /// The plugin sits on a dependency cycle
    #[error("Could not determine a way to load '{plugin}': circular dependency detected")]
    CircularDependency { plugin: String },

    /// A hard dependency was itself excluded by the sort
    #[error("Could not load '{plugin}': dependency '{dependency}' could not be loaded")]
    UnresolvedDependency { plugin: String, dependency: String },
}

impl ResolveError {
    /// Name of the excluded plugin, when the descriptor got far enough to
    /// have one
    pub fn plugin(&self) -> Option<&str> {
        match self {
            ResolveError::InvalidDescription { .. } => None,
            ResolveError::DuplicateName { name, .. } => Some(name),
            ResolveError::MissingDependency { plugin, .. }
            | ResolveError::CircularDependency { plugin }
            | ResolveError::UnresolvedDependency { plugin, .. } => Some(plugin),
        }
    }
}

/// One plugin in the graph.
///
/// Nodes compare and hash by name only.
#[derive(Debug, Clone)]
pub struct PluginNode {
    descriptor: PluginDescriptor,
    file: PathBuf,
    dependencies: Vec<usize>,
    dependents: Vec<usize>,
}

impl PluginNode {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Indices of the nodes this node depends on, in declaration order
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    /// Indices of the nodes depending on this node
    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }
}

impl PartialEq for PluginNode {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for PluginNode {}

impl Hash for PluginNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

/// A directed edge from a dependent to its dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: usize,
    pub to: usize,
}

/// Plugins of one batch and the dependency edges between them.
///
/// The graph is transient: it is built for one `load_all` call and dropped
/// once the load order is known.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<PluginNode>,
    index: HashMap<String, usize>,
    edges: Vec<DependencyEdge>,
    excluded: Vec<ResolveError>,
}

impl DependencyGraph {
    /// Build the graph for a batch of `(file, descriptor)` pairs.
    ///
    /// Entries are kept in the given order. A name seen twice keeps its
    /// first file. A plugin whose hard dependency is not in the batch is
    /// excluded, and so is everything that hard-depends on it.
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, PluginDescriptor)>,
    {
        let mut excluded = Vec::new();
        let mut candidates: Vec<(PathBuf, PluginDescriptor)> = Vec::new();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for (file, descriptor) in entries {
            if let Some(existing) = seen.get(&descriptor.name) {
                excluded.push(ResolveError::DuplicateName {
                    name: descriptor.name.clone(),
                    file,
                    existing: existing.clone(),
                });
                continue;
            }
            seen.insert(descriptor.name.clone(), file.clone());
            candidates.push((file, descriptor));
        }

        // Missing hard dependencies cascade: drop until nothing changes.
        let mut present: HashSet<String> = candidates.iter().map(|(_, d)| d.name.clone()).collect();
        loop {
            let mut dropped = false;
            candidates.retain(|(_, descriptor)| {
                match descriptor.depend.iter().find(|dep| !present.contains(*dep)) {
                    Some(dependency) => {
                        excluded.push(ResolveError::MissingDependency {
                            plugin: descriptor.name.clone(),
                            dependency: dependency.clone(),
                        });
                        present.remove(&descriptor.name);
                        dropped = true;
                        false
                    }
                    None => true,
                }
            });
            if !dropped {
                break;
            }
        }

        let mut graph = Self {
            excluded,
            ..Self::default()
        };

        for (file, descriptor) in candidates {
            graph.index.insert(descriptor.name.clone(), graph.nodes.len());
            graph.nodes.push(PluginNode {
                descriptor,
                file,
                dependencies: Vec::new(),
                dependents: Vec::new(),
            });
        }

        for from in 0..graph.nodes.len() {
            let descriptor = &graph.nodes[from].descriptor;
            let targets: Vec<usize> = descriptor
                .depend
                .iter()
                .chain(descriptor.soft_depend.iter())
                .filter_map(|name| graph.index.get(name).copied())
                .collect();

            for to in targets {
                graph.add_edge(from, to);
            }
        }

        graph
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if self.nodes[from].dependencies.contains(&to) {
            return;
        }
        self.nodes[from].dependencies.push(to);
        self.nodes[to].dependents.push(from);
        self.edges.push(DependencyEdge { from, to });
    }

    pub fn nodes(&self) -> &[PluginNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Look up a node by plugin name (case-sensitive)
    pub fn node(&self, name: &str) -> Option<&PluginNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Plugins excluded while building the graph
    pub fn excluded(&self) -> &[ResolveError] {
        &self.excluded
    }

    /// Names of soft dependencies that are not part of the graph, per plugin
    pub fn absent_soft_dependencies(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.descriptor
                    .soft_depend
                    .iter()
                    .filter(|dep| !self.index.contains_key(*dep))
                    .map(move |dep| (node.name(), dep.as_str()))
            })
            .collect()
    }
}

/// A plugin that made it into the load order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlugin {
    pub descriptor: PluginDescriptor,
    pub file: PathBuf,
}

impl ResolvedPlugin {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Result of resolving a batch: what to load, in order, and what was left out
#[derive(Debug, Clone, Default)]
pub struct LoadOrder {
    pub order: Vec<ResolvedPlugin>,
    pub excluded: Vec<ResolveError>,
}

impl LoadOrder {
    /// Plugin names in load order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(ResolvedPlugin::name).collect()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e.plugin() == Some(name))
    }
}

/// Order the graph so every dependency precedes its dependents.
///
/// Ready nodes are taken first-in first-out. The queue is seeded in reverse
/// discovery order so that, after the final reversal, plugins with no
/// relation to each other keep the order in which they were discovered.
///
/// Every node still awaiting a dependent after the queue drains is reported
/// as circular and left out. That covers the cycle members and anything
/// they depend on. A final pass drops any plugin whose hard dependency did
/// not make it into the order.
pub fn sort(graph: DependencyGraph) -> LoadOrder {
    let DependencyGraph {
        nodes, excluded, ..
    } = graph;
    let mut excluded = excluded;

    let mut pending: Vec<usize> = nodes.iter().map(|n| n.dependents.len()).collect();
    let mut queue: VecDeque<usize> = (0..nodes.len()).rev().filter(|&i| pending[i] == 0).collect();
    let mut processed = vec![false; nodes.len()];
    let mut sorted = Vec::with_capacity(nodes.len());

    while let Some(current) = queue.pop_front() {
        processed[current] = true;
        sorted.push(current);
        for &dependency in nodes[current].dependencies.iter().rev() {
            pending[dependency] -= 1;
            if pending[dependency] == 0 {
                queue.push_back(dependency);
            }
        }
    }

    for node in (0..nodes.len()).filter(|&i| !processed[i]) {
        excluded.push(ResolveError::CircularDependency {
            plugin: nodes[node].name().to_string(),
        });
    }

    sorted.reverse();
    let mut loaded: HashSet<usize> = HashSet::new();
    let mut order = Vec::with_capacity(sorted.len());

    for node in sorted {
        let unresolved = nodes[node].descriptor.depend.iter().find(|dep| {
            nodes
                .iter()
                .position(|n| n.name() == dep.as_str())
                .is_none_or(|i| !loaded.contains(&i))
        });

        if let Some(dependency) = unresolved {
            excluded.push(ResolveError::UnresolvedDependency {
                plugin: nodes[node].name().to_string(),
                dependency: dependency.clone(),
            });
            continue;
        }

        loaded.insert(node);
        order.push(ResolvedPlugin {
            descriptor: nodes[node].descriptor.clone(),
            file: nodes[node].file.clone(),
        });
    }

    LoadOrder { order, excluded }
}
