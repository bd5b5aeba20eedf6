use thiserror::Error;

/// Structural errors raised while resolving a pipeline definition.
///
/// Any of these aborts resolution; nothing executes and nothing is written.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("duplicate target name '{name}'")]
  DuplicateTarget { name: String },

  #[error("failed to parse expression for target '{target}' at offset {position}: {message}")]
  Parse {
    target: String,
    position: usize,
    message: String,
  },

  #[error("target '{target}' calls unknown function '{function}'")]
  UnknownFunction { target: String, function: String },

  #[error(
    "target '{target}' calls '{function}' with {got} argument(s), expected {expected}"
  )]
  ArityMismatch {
    target: String,
    function: String,
    expected: usize,
    got: usize,
  },

  #[error("target '{target}' references undeclared name '{reference}'")]
  UndeclaredReference { target: String, reference: String },

  #[error("dependency cycle detected: {}", path.join(" -> "))]
  CycleDetected { path: Vec<String> },
}
