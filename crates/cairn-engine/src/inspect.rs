//! Inspection API: manifest and graph visualization.
//!
//! Pure projections of pipeline and staleness state. Nothing here executes
//! a target or writes to the store.

use std::collections::HashMap;

use cairn_pipeline::Pipeline;
use cairn_store::Store;
use serde::{Deserialize, Serialize};

use crate::staleness::{classify, Staleness};

/// Display status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
  Current,
  Stale,
  Error,
  Blocked,
}

/// One row of the manifest: a declared target with its inferred edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
  pub name: String,
  /// Canonical expression rendering.
  pub expr: String,
  pub deps: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub files: Vec<String>,
}

/// A manifest row with the target's current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
  #[serde(flatten)]
  pub entry: ManifestEntry,
  pub status: TargetStatus,
}

/// The declared target list with dependency edges, in declaration order.
/// Read-only snapshot; no execution, no store access.
pub fn manifest(pipeline: &Pipeline) -> Vec<ManifestEntry> {
  pipeline
    .targets
    .iter()
    .map(|target| ManifestEntry {
      name: target.name.clone(),
      expr: target.expr.to_string(),
      deps: target.deps.clone(),
      files: target
        .files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect(),
    })
    .collect()
}

/// The manifest with per-target status from a fresh staleness
/// classification.
pub async fn status_manifest(pipeline: &Pipeline, store: &dyn Store) -> Vec<StatusEntry> {
  let statuses = statuses(pipeline, store).await;
  manifest(pipeline)
    .into_iter()
    .map(|entry| {
      let status = statuses
        .get(&entry.name)
        .copied()
        .unwrap_or(TargetStatus::Stale);
      StatusEntry { entry, status }
    })
    .collect()
}

/// Classify the pipeline and project the result onto display statuses.
///
/// A target whose own record is an error shows as `Error`; a stale target
/// downstream of an `Error`/`Blocked` one shows as `Blocked` (it cannot
/// run until the failure is fixed); any other stale target shows `Stale`.
pub async fn statuses(
  pipeline: &Pipeline,
  store: &dyn Store,
) -> HashMap<String, TargetStatus> {
  let classification = classify(pipeline, store).await;

  let mut statuses: HashMap<String, TargetStatus> = HashMap::new();
  for name in &pipeline.topo {
    let status = match classification.staleness.get(name) {
      Some(Staleness::Current) => TargetStatus::Current,
      _ if classification.errored.contains_key(name) => TargetStatus::Error,
      _ => {
        // Statuses are computed in topological order, so upstreams are
        // already present.
        let blocked_upstream = pipeline.get(name).is_some_and(|target| {
          target.deps.iter().any(|dep| {
            matches!(
              statuses.get(dep),
              Some(TargetStatus::Error | TargetStatus::Blocked)
            )
          })
        });
        if blocked_upstream {
          TargetStatus::Blocked
        } else {
          TargetStatus::Stale
        }
      }
    };
    statuses.insert(name.clone(), status);
  }
  statuses
}

/// Render the pipeline as Graphviz DOT with per-target status coloring.
pub fn render_dot(pipeline: &Pipeline, statuses: &HashMap<String, TargetStatus>) -> String {
  let mut out = String::new();
  out.push_str(&format!("digraph \"{}\" {{\n", pipeline.name));
  out.push_str("  rankdir=LR;\n");
  out.push_str("  node [shape=box, style=\"rounded,filled\"];\n");

  for target in &pipeline.targets {
    let color = match statuses.get(&target.name) {
      Some(TargetStatus::Current) => "palegreen",
      Some(TargetStatus::Error) => "lightcoral",
      Some(TargetStatus::Blocked) => "lightgray",
      Some(TargetStatus::Stale) | None => "orange",
    };
    out.push_str(&format!(
      "  \"{}\" [fillcolor={}];\n",
      target.name, color
    ));
  }

  for (from, to) in &pipeline.edges {
    out.push_str(&format!("  \"{}\" -> \"{}\";\n", from, to));
  }

  out.push_str("}\n");
  out
}
