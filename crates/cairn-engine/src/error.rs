//! Engine errors.

use cairn_functions::FunctionError;

/// A per-target runtime failure.
///
/// Recorded in the target's run record and the build report; never aborts
/// unrelated branches of the graph.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
  /// A registered function failed.
  #[error(transparent)]
  Function(#[from] FunctionError),

  /// Evaluation panicked (caught at the task boundary).
  #[error("panic during evaluation: {message}")]
  Panic { message: String },

  /// The store failed while reading an upstream result or persisting this
  /// target's record.
  #[error("store error: {0}")]
  Store(#[from] cairn_store::Error),

  /// An upstream result was unavailable at evaluation time. The resolver
  /// guarantees references are declared, so this indicates a scheduling
  /// bug.
  #[error("upstream result '{name}' unavailable")]
  MissingUpstream { name: String },

  /// The expression called a function absent from the registry at
  /// execution time. The resolver validates calls, so this can only
  /// happen if the registry changed after resolution.
  #[error("function '{name}' not registered")]
  UnknownFunction { name: String },
}

/// A failure of the build pass itself, as opposed to a per-target error.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  /// The pass was cancelled; in-flight targets were allowed to finish and
  /// persist before returning.
  #[error("build cancelled")]
  Cancelled,

  /// A spawned task could not be joined.
  #[error("internal error: {message}")]
  Internal { message: String },
}

/// Errors from `read()`.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
  /// The name does not match any declared target.
  #[error("unknown target '{0}'")]
  UnknownTarget(String),

  /// The target has never completed a successful run.
  #[error("target '{0}' has no cached result; run a build first")]
  NotFound(String),

  /// The store failed.
  #[error("store error: {0}")]
  Store(cairn_store::Error),
}
