use serde::{Deserialize, Serialize};

use crate::inspect::TargetStatus;

/// Outcome of one target within a build pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
  /// The target was stale and re-executed successfully.
  Executed { duration_ms: u64 },
  /// The target was current; its cached result was reused.
  Skipped,
  /// The target ran and failed; the error is recorded in its run record.
  Failed { error: String },
  /// The target was not attempted because an ancestor failed.
  Blocked { upstream: String },
}

/// One target's entry in the build report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
  pub target: String,
  #[serde(flatten)]
  pub outcome: TargetOutcome,
}

/// Result of a build pass: per-target outcomes in topological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
  pub build_id: String,
  pub pipeline: String,
  pub targets: Vec<TargetReport>,
}

impl BuildReport {
  /// Whether every target is either up to date or freshly executed.
  pub fn is_success(&self) -> bool {
    self.failed_count() == 0 && self.blocked_count() == 0
  }

  pub fn executed_count(&self) -> usize {
    self
      .targets
      .iter()
      .filter(|t| matches!(t.outcome, TargetOutcome::Executed { .. }))
      .count()
  }

  pub fn skipped_count(&self) -> usize {
    self
      .targets
      .iter()
      .filter(|t| matches!(t.outcome, TargetOutcome::Skipped))
      .count()
  }

  pub fn failed_count(&self) -> usize {
    self
      .targets
      .iter()
      .filter(|t| matches!(t.outcome, TargetOutcome::Failed { .. }))
      .count()
  }

  pub fn blocked_count(&self) -> usize {
    self
      .targets
      .iter()
      .filter(|t| matches!(t.outcome, TargetOutcome::Blocked { .. }))
      .count()
  }

  /// Failed targets with their error messages.
  pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
    self.targets.iter().filter_map(|t| match &t.outcome {
      TargetOutcome::Failed { error } => Some((t.target.as_str(), error.as_str())),
      _ => None,
    })
  }

  /// Per-target status for visualization of this pass's outcome.
  pub fn statuses(&self) -> std::collections::HashMap<String, TargetStatus> {
    self
      .targets
      .iter()
      .map(|t| {
        let status = match &t.outcome {
          TargetOutcome::Executed { .. } | TargetOutcome::Skipped => TargetStatus::Current,
          TargetOutcome::Failed { .. } => TargetStatus::Error,
          TargetOutcome::Blocked { .. } => TargetStatus::Blocked,
        };
        (t.target.clone(), status)
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn report() -> BuildReport {
    BuildReport {
      build_id: "b1".to_string(),
      pipeline: "demo".to_string(),
      targets: vec![
        TargetReport {
          target: "load".to_string(),
          outcome: TargetOutcome::Skipped,
        },
        TargetReport {
          target: "double".to_string(),
          outcome: TargetOutcome::Executed { duration_ms: 3 },
        },
        TargetReport {
          target: "broken".to_string(),
          outcome: TargetOutcome::Failed {
            error: "boom".to_string(),
          },
        },
        TargetReport {
          target: "after".to_string(),
          outcome: TargetOutcome::Blocked {
            upstream: "broken".to_string(),
          },
        },
      ],
    }
  }

  #[test]
  fn counts_and_success() {
    let report = report();
    assert_eq!(report.executed_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.blocked_count(), 1);
    assert!(!report.is_success());

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures, vec![("broken", "boom")]);
  }

  #[test]
  fn serializes_with_tagged_outcomes() {
    let json = serde_json::to_value(report()).unwrap();
    assert_eq!(json["targets"][0]["outcome"], "skipped");
    assert_eq!(json["targets"][1]["outcome"], "executed");
    assert_eq!(json["targets"][1]["duration_ms"], 3);
    assert_eq!(json["targets"][3]["upstream"], "broken");
  }
}
