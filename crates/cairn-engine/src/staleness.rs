//! Staleness classification.
//!
//! Before a pass executes anything, every target is classified `Current`
//! or `Stale` in topological order. Staleness propagates forward: a stale
//! ancestor forces every descendant stale regardless of its own record,
//! so `Current` holds only when the entire ancestry is current.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use cairn_pipeline::{content_hash, Pipeline, Target};
use cairn_store::{RunRecord, RunStatus, Store};
use tracing::{debug, warn};

/// Why a target was classified stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StaleReason {
  NeverRun,
  PreviousError,
  DefinitionChanged,
  InputChanged { path: String },
  UpstreamStale { upstream: String },
  UpstreamReran { upstream: String },
}

impl fmt::Display for StaleReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StaleReason::NeverRun => write!(f, "never run"),
      StaleReason::PreviousError => write!(f, "previous run failed"),
      StaleReason::DefinitionChanged => write!(f, "definition changed"),
      StaleReason::InputChanged { path } => write!(f, "input file '{}' changed", path),
      StaleReason::UpstreamStale { upstream } => {
        write!(f, "upstream '{}' is stale", upstream)
      }
      StaleReason::UpstreamReran { upstream } => {
        write!(f, "upstream '{}' re-ran since last run", upstream)
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Staleness {
  Current,
  Stale(StaleReason),
}

impl Staleness {
  pub fn is_stale(&self) -> bool {
    matches!(self, Staleness::Stale(_))
  }
}

/// Result of a classification pass.
pub(crate) struct Classification {
  /// Per-target staleness, complete over the pipeline.
  pub staleness: HashMap<String, Staleness>,
  /// Current content hashes of each target's declared files. Computed
  /// once here and recorded verbatim by the executor.
  pub file_hashes: HashMap<String, BTreeMap<String, String>>,
  /// Stored result hash per target with a successful record.
  pub result_hashes: HashMap<String, String>,
  /// Targets whose stored record is an error record.
  pub errored: HashMap<String, String>,
}

/// Classify every target in the pipeline.
///
/// Store read failures are scoped to the affected target: its record is
/// treated as lost (the target re-runs and rewrites it) and no other
/// target is affected.
pub(crate) async fn classify(pipeline: &Pipeline, store: &dyn Store) -> Classification {
  let mut staleness: HashMap<String, Staleness> = HashMap::new();
  let mut file_hashes: HashMap<String, BTreeMap<String, String>> = HashMap::new();
  let mut result_hashes: HashMap<String, String> = HashMap::new();
  let mut errored: HashMap<String, String> = HashMap::new();

  for name in &pipeline.topo {
    let target = match pipeline.get(name) {
      Some(target) => target,
      None => continue,
    };

    let record = match store.record(name).await {
      Ok(record) => record,
      Err(e) => {
        warn!(target = %name, error = %e, "failed to read run record, treating as never run");
        None
      }
    };

    if let Some(record) = &record {
      if let Some(hash) = &record.result_hash
        && record.status == RunStatus::Success
      {
        result_hashes.insert(name.clone(), hash.clone());
      }
      if record.status == RunStatus::Error {
        errored.insert(
          name.clone(),
          record.error.clone().unwrap_or_else(|| "unknown error".to_string()),
        );
      }
    }

    let (current_files, missing) = hash_files(target).await;
    let state = decide(
      target,
      record.as_ref(),
      &current_files,
      missing,
      &staleness,
      &result_hashes,
    );

    if let Staleness::Stale(reason) = &state {
      debug!(target = %name, reason = %reason, "target is stale");
    }

    file_hashes.insert(name.clone(), current_files);
    staleness.insert(name.clone(), state);
  }

  Classification {
    staleness,
    file_hashes,
    result_hashes,
    errored,
  }
}

fn decide(
  target: &Target,
  record: Option<&RunRecord>,
  current_files: &BTreeMap<String, String>,
  missing_file: Option<String>,
  staleness: &HashMap<String, Staleness>,
  result_hashes: &HashMap<String, String>,
) -> Staleness {
  // A missing declared input always forces a run; the failure surfaces as
  // that target's execution error if the file is still absent then.
  if let Some(path) = missing_file {
    return Staleness::Stale(StaleReason::InputChanged { path });
  }

  let Some(record) = record else {
    return Staleness::Stale(StaleReason::NeverRun);
  };

  if record.status == RunStatus::Error {
    return Staleness::Stale(StaleReason::PreviousError);
  }

  if record.def_hash != target.def_hash {
    return Staleness::Stale(StaleReason::DefinitionChanged);
  }

  if record.file_hashes != *current_files {
    let path = current_files
      .iter()
      .find(|(path, hash)| record.file_hashes.get(path.as_str()) != Some(*hash))
      .map(|(path, _)| path.to_string())
      .or_else(|| record.file_hashes.keys().next().map(|p| p.to_string()))
      .unwrap_or_default();
    return Staleness::Stale(StaleReason::InputChanged { path });
  }

  // Upstream checks. Deps are classified before us (topological order).
  for dep in &target.deps {
    if staleness.get(dep).is_some_and(Staleness::is_stale) {
      return Staleness::Stale(StaleReason::UpstreamStale {
        upstream: dep.clone(),
      });
    }
  }
  for dep in &target.deps {
    if record.dep_hashes.get(dep) != result_hashes.get(dep) {
      return Staleness::Stale(StaleReason::UpstreamReran {
        upstream: dep.clone(),
      });
    }
  }

  Staleness::Current
}

/// Hash a target's declared files. Returns the hashes plus the first
/// unreadable path, if any.
async fn hash_files(target: &Target) -> (BTreeMap<String, String>, Option<String>) {
  let mut hashes = BTreeMap::new();
  let mut missing = None;

  for path in &target.files {
    let path_str = path.to_string_lossy().into_owned();
    match tokio::fs::read(path).await {
      Ok(bytes) => {
        hashes.insert(path_str, content_hash(&bytes));
      }
      Err(e) => {
        debug!(target = %target.name, path = %path_str, error = %e, "failed to hash input file");
        if missing.is_none() {
          missing = Some(path_str);
        }
      }
    }
  }

  (hashes, missing)
}
