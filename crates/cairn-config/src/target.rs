use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single target declaration.
///
/// `expr` is the defining expression, e.g. `scale_column(load, "value", 2)`.
/// Bare identifiers inside the expression reference other targets by name;
/// the call head must name a registered function. The expression is parsed
/// statically by the resolver and only evaluated by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDef {
  pub name: String,
  pub expr: String,
  /// External data files this target reads. Their content hashes feed
  /// staleness tracking; the engine never interprets their format.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub files: Vec<PathBuf>,
}
