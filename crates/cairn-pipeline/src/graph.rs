use std::collections::{HashMap, HashSet, VecDeque};

use crate::target::Target;

/// Graph structure for traversal and analysis.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: target name -> list of downstream target names.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: target name -> list of upstream target names.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Targets with no incoming edges (root/source nodes).
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from locked targets and edges.
  pub fn new(targets: &[Target], edges: &[(String, String)]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    // Initialize all targets
    for target in targets {
      adjacency.entry(target.name.clone()).or_default();
      reverse_adjacency.entry(target.name.clone()).or_default();
    }

    // Build adjacency lists
    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    // Find entry points (no incoming edges), in declaration order
    let entry_points: Vec<String> = targets
      .iter()
      .filter(|t| {
        reverse_adjacency
          .get(&t.name)
          .is_none_or(|v| v.is_empty())
      })
      .map(|t| t.name.clone())
      .collect();

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Get entry points (targets with no incoming edges).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get downstream targets for a given target.
  pub fn downstream(&self, name: &str) -> &[String] {
    self.adjacency.get(name).map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Get upstream targets for a given target.
  pub fn upstream(&self, name: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// All transitive downstream targets of `name`, excluding `name` itself.
  ///
  /// Used for forward staleness propagation and for blocking the subgraph
  /// below a failed target.
  pub fn descendants(&self, name: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut out = Vec::new();

    queue.push_back(name);
    while let Some(current) = queue.pop_front() {
      for next in self.downstream(current) {
        if seen.insert(next.as_str()) {
          out.push(next.clone());
          queue.push_back(next.as_str());
        }
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expr::Expr;

  fn target(name: &str) -> Target {
    Target::new(name.to_string(), Expr::Num(0.0), vec![])
  }

  fn edge(from: &str, to: &str) -> (String, String) {
    (from.to_string(), to.to_string())
  }

  /// Diamond: a -> b, a -> c, b -> d, c -> d.
  fn diamond() -> Graph {
    let targets = vec![target("a"), target("b"), target("c"), target("d")];
    let edges = vec![
      edge("a", "b"),
      edge("a", "c"),
      edge("b", "d"),
      edge("c", "d"),
    ];
    Graph::new(&targets, &edges)
  }

  #[test]
  fn entry_points_are_roots() {
    let graph = diamond();
    assert_eq!(graph.entry_points(), &["a".to_string()]);
  }

  #[test]
  fn upstream_and_downstream() {
    let graph = diamond();
    assert_eq!(graph.downstream("a"), &["b".to_string(), "c".to_string()]);
    assert_eq!(graph.upstream("d"), &["b".to_string(), "c".to_string()]);
    assert!(graph.upstream("a").is_empty());
    assert!(graph.downstream("d").is_empty());
  }

  #[test]
  fn descendants_are_transitive_and_deduplicated() {
    let graph = diamond();
    let mut desc = graph.descendants("a");
    desc.sort();
    assert_eq!(desc, vec!["b".to_string(), "c".to_string(), "d".to_string()]);
    assert_eq!(graph.descendants("b"), vec!["d".to_string()]);
    assert!(graph.descendants("d").is_empty());
  }

  #[test]
  fn unknown_name_has_no_neighbors() {
    let graph = diamond();
    assert!(graph.downstream("nope").is_empty());
    assert!(graph.descendants("nope").is_empty());
  }
}
