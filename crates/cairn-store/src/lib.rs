//! Cairn Store
//!
//! This crate provides the durable store for target results and run
//! records. Results persist across process invocations, keyed by target
//! name.
//!
//! The [`Store`] trait defines operations for:
//! - Reading a target's run record
//! - Reading a target's cached result
//! - Persisting a run record together with its result blob
//!
//! [`FsStore`] is the directory-backed implementation: one JSON file per
//! target, updated atomically (write to a temp file, then rename), so a
//! crash mid-write leaves the previous valid state. Writes are scoped
//! per-target-name; concurrent writes to different targets never contend.

mod fs;
mod types;

pub use fs::FsStore;
pub use types::{RunRecord, RunStatus};

use async_trait::async_trait;

/// Error type for store operations.
///
/// An I/O failure on one target's entry never affects another target's
/// entry; every entry lives in its own file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The target has no successful run record.
  #[error("no cached result for target '{0}'")]
  NotFound(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A stored entry could not be (de)serialized.
  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),
}

/// Storage trait for target results and run records.
#[async_trait]
pub trait Store: Send + Sync {
  /// Get the run record for a target, if one exists.
  async fn record(&self, target: &str) -> Result<Option<RunRecord>, Error>;

  /// Get the cached result for a target.
  ///
  /// Fails with [`Error::NotFound`] if the target has never completed a
  /// successful run.
  async fn result(&self, target: &str) -> Result<serde_json::Value, Error>;

  /// Persist a run record, with the result blob for successful runs.
  ///
  /// The record and result are committed together atomically.
  async fn put(
    &self,
    record: &RunRecord,
    result: Option<&serde_json::Value>,
  ) -> Result<(), Error>;
}
