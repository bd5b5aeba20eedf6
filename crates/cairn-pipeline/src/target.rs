use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::hash::content_hash;

/// A locked target: a named unit of computation with its analyzed
/// expression, inferred upstream dependencies, and definition hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
  pub name: String,
  pub expr: Expr,
  /// Upstream target names, in order of first reference.
  pub deps: Vec<String>,
  /// Declared external data files, hash-tracked for staleness.
  pub files: Vec<PathBuf>,
  /// Content hash of the definition (canonical expression + file set).
  /// A changed hash invalidates the cached result.
  pub def_hash: String,
}

impl Target {
  /// Lock a target from its analyzed expression.
  pub fn new(name: String, expr: Expr, files: Vec<PathBuf>) -> Self {
    let deps = expr.references();
    let def_hash = definition_hash(&expr, &files);
    Self {
      name,
      expr,
      deps,
      files,
      def_hash,
    }
  }
}

/// Hash a definition: the canonical expression rendering plus the sorted,
/// deduplicated file list. File order in the declaration is not semantic.
fn definition_hash(expr: &Expr, files: &[PathBuf]) -> String {
  let mut paths: Vec<String> = files
    .iter()
    .map(|p| p.to_string_lossy().into_owned())
    .collect();
  paths.sort();
  paths.dedup();

  let mut buf = expr.to_string();
  for path in &paths {
    buf.push('\n');
    buf.push_str(path);
  }
  content_hash(buf.as_bytes())
}
