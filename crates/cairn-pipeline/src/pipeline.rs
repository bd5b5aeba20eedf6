use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::target::Target;

/// A locked pipeline ready for staleness classification and execution.
///
/// Produced by the resolver; structurally valid by construction (every
/// reference names a declared target, no cycles). `targets` preserves
/// declaration order; `topo` is a topological order with declaration-order
/// tie-breaks, so execution and reporting are deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
  pub name: String,
  pub targets: Vec<Target>,
  /// Dependency edges as (upstream, downstream) pairs.
  pub edges: Vec<(String, String)>,
  /// Topological order over target names.
  pub topo: Vec<String>,
}

impl Pipeline {
  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.targets, &self.edges)
  }

  /// Get a target by name.
  pub fn get(&self, name: &str) -> Option<&Target> {
    self.targets.iter().find(|t| t.name == name)
  }

  /// Whether a target with this name is declared.
  pub fn contains(&self, name: &str) -> bool {
    self.get(name).is_some()
  }
}
