/// Errors raised by registered functions at execution time.
///
/// These are runtime failures, isolated per target by the executor; the
/// resolver has already guaranteed the function exists and the call has the
/// right number of arguments.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
  /// An argument had the wrong type or an invalid value.
  #[error("bad argument for {function}: {message}")]
  BadArgument { function: String, message: String },

  /// A named column was missing from a table row.
  #[error("column '{column}' not found in input to {function}")]
  MissingColumn { function: String, column: String },

  /// An I/O error occurred (e.g. a declared input file is unreadable).
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A CSV file could not be parsed.
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  /// A JSON file could not be parsed.
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}
