use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a target's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Success,
  Error,
}

/// Per-target record of the most recent execution. Read by the staleness
/// tracker on the next invocation; written only by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub target: String,
  pub status: RunStatus,
  /// Definition hash at the time of the run.
  pub def_hash: String,
  /// Content hash of the stored result (successful runs only).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_hash: Option<String>,
  /// Result hashes of the upstream targets this run consumed, keyed by
  /// target name. A mismatch on the next pass means an upstream re-ran.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub dep_hashes: BTreeMap<String, String>,
  /// Content hashes of declared input files at the time of the run.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub file_hashes: BTreeMap<String, String>,
  /// Captured failure message (failed runs only).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
}

/// On-disk entry: the run record plus the result blob it committed with.
/// Keeping both in one file makes the rename the commit point for the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
  pub record: RunRecord,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Value>,
}
