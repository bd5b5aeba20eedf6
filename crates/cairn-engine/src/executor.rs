//! Staleness-aware pipeline executor.
//!
//! Targets execute in dependency order. `Current` targets are skipped and
//! their stored results reused; `Stale` targets run once every upstream has
//! completed. A failed target is recorded and its descendants blocked while
//! unrelated branches keep executing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use cairn_functions::FunctionRegistry;
use cairn_pipeline::{content_hash, Expr, Pipeline, Target};
use cairn_store::{RunRecord, RunStatus, Store};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{BuildError, ExecutionError};
use crate::report::{BuildReport, TargetOutcome, TargetReport};
use crate::staleness::{classify, Staleness};

/// Configuration for the executor.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
  /// Maximum number of targets executing concurrently. `None` means
  /// unbounded; `Some(1)` gives strictly sequential execution.
  pub max_workers: Option<usize>,
}

/// Per-target scheduling state during a pass.
#[derive(Debug, Clone)]
enum NodeState {
  /// Valid cached result; skipped.
  Current,
  /// Stale, waiting for upstreams.
  Pending,
  Succeeded {
    duration_ms: u64,
  },
  Failed {
    error: String,
  },
  /// Not attempted because an ancestor failed.
  Blocked {
    upstream: String,
  },
}

/// The pipeline executor.
pub struct Executor {
  config: EngineConfig,
}

impl Executor {
  /// Create a new executor.
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }

  /// Run one staleness-aware build pass.
  ///
  /// Returns the per-target report; per-target failures are reported, not
  /// propagated. Fails only on cancellation or an internal join error.
  pub async fn execute(
    &self,
    pipeline: &Pipeline,
    functions: Arc<FunctionRegistry>,
    store: Arc<dyn Store>,
    cancel: CancellationToken,
  ) -> Result<BuildReport, BuildError> {
    let build_id = uuid::Uuid::new_v4().to_string();

    info!(
      build_id = %build_id,
      pipeline = %pipeline.name,
      targets = pipeline.targets.len(),
      "build_started"
    );

    let classification = classify(pipeline, store.as_ref()).await;

    let mut states: HashMap<String, NodeState> = HashMap::new();
    for name in &pipeline.topo {
      let state = match classification.staleness.get(name) {
        Some(Staleness::Current) => NodeState::Current,
        _ => NodeState::Pending,
      };
      states.insert(name.clone(), state);
    }

    // Result values produced or loaded during this pass, and the stored
    // result hash for every target that currently has one.
    let mut results: HashMap<String, Value> = HashMap::new();
    let mut result_hashes = classification.result_hashes.clone();

    let semaphore = self
      .config
      .max_workers
      .map(|n| Arc::new(Semaphore::new(n.max(1))));

    let graph = pipeline.graph();

    loop {
      if cancel.is_cancelled() {
        warn!(build_id = %build_id, "build cancelled, not scheduling further targets");
        return Err(BuildError::Cancelled);
      }

      let ready = find_ready(pipeline, &states);
      if ready.is_empty() {
        break;
      }

      debug!(build_id = %build_id, ready_targets = ?ready, "executing batch of ready targets");

      let mut handles = Vec::with_capacity(ready.len());
      for name in ready {
        let target = match pipeline.get(&name) {
          Some(target) => target.clone(),
          None => continue,
        };

        // Gather upstream values, loading stored results for targets that
        // were skipped as current. A load failure fails this target only.
        match gather_upstream(&target, &mut results, store.as_ref()).await {
          Ok(upstream) => {
            let functions = functions.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
              let _permit = match semaphore {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
              };
              let started_at = Utc::now();
              let start = Instant::now();
              let result = run_target(&target, upstream, &functions).await;
              (target, started_at, start.elapsed().as_millis() as u64, result)
            }));
          }
          Err(e) => {
            self
              .record_failure(
                &build_id,
                pipeline,
                &graph,
                &mut states,
                store.as_ref(),
                &name,
                Utc::now(),
                &classification.file_hashes,
                &result_hashes,
                e,
              )
              .await;
          }
        }
      }

      let batch = futures::future::join_all(handles).await;

      for joined in batch {
        let (target, started_at, duration_ms, result) =
          joined.map_err(|e| BuildError::Internal {
            message: format!("task join error: {}", e),
          })?;

        match result {
          Ok(value) => {
            let result_hash = content_hash(&canonical_bytes(&value));
            let record = RunRecord {
              target: target.name.clone(),
              status: RunStatus::Success,
              def_hash: target.def_hash.clone(),
              result_hash: Some(result_hash.clone()),
              dep_hashes: target
                .deps
                .iter()
                .filter_map(|d| result_hashes.get(d).map(|h| (d.clone(), h.clone())))
                .collect(),
              file_hashes: classification
                .file_hashes
                .get(&target.name)
                .cloned()
                .unwrap_or_default(),
              error: None,
              started_at,
              completed_at: Utc::now(),
            };

            if let Err(e) = store.put(&record, Some(&value)).await {
              // Persisting failed: the run's output cannot be trusted to
              // exist, so treat the target as failed.
              self
                .record_failure(
                  &build_id,
                  pipeline,
                  &graph,
                  &mut states,
                  store.as_ref(),
                  &target.name,
                  started_at,
                  &classification.file_hashes,
                  &result_hashes,
                  ExecutionError::Store(e),
                )
                .await;
              continue;
            }

            info!(
              build_id = %build_id,
              target = %target.name,
              duration_ms,
              "target_completed"
            );
            results.insert(target.name.clone(), value);
            result_hashes.insert(target.name.clone(), result_hash);
            states.insert(target.name.clone(), NodeState::Succeeded { duration_ms });
          }
          Err(e) => {
            self
              .record_failure(
                &build_id,
                pipeline,
                &graph,
                &mut states,
                store.as_ref(),
                &target.name,
                started_at,
                &classification.file_hashes,
                &result_hashes,
                e,
              )
              .await;
          }
        }
      }
    }

    let report = build_report(&build_id, pipeline, &states);
    info!(
      build_id = %build_id,
      executed = report.executed_count(),
      skipped = report.skipped_count(),
      failed = report.failed_count(),
      blocked = report.blocked_count(),
      "build_completed"
    );

    Ok(report)
  }

  /// Record a per-target failure and block its unexecuted descendants.
  #[allow(clippy::too_many_arguments)]
  async fn record_failure(
    &self,
    build_id: &str,
    pipeline: &Pipeline,
    graph: &cairn_pipeline::Graph,
    states: &mut HashMap<String, NodeState>,
    store: &dyn Store,
    name: &str,
    started_at: DateTime<Utc>,
    file_hashes: &HashMap<String, std::collections::BTreeMap<String, String>>,
    result_hashes: &HashMap<String, String>,
    error: ExecutionError,
  ) {
    let message = error.to_string();
    error!(build_id = %build_id, target = %name, error = %message, "target_failed");

    if let Some(target) = pipeline.get(name) {
      let record = RunRecord {
        target: name.to_string(),
        status: RunStatus::Error,
        def_hash: target.def_hash.clone(),
        result_hash: None,
        dep_hashes: target
          .deps
          .iter()
          .filter_map(|d| result_hashes.get(d).map(|h| (d.clone(), h.clone())))
          .collect(),
        file_hashes: file_hashes.get(name).cloned().unwrap_or_default(),
        error: Some(message.clone()),
        started_at,
        completed_at: Utc::now(),
      };
      if let Err(e) = store.put(&record, None).await {
        warn!(build_id = %build_id, target = %name, error = %e, "failed to persist error record");
      }
    }

    states.insert(name.to_string(), NodeState::Failed { error: message });

    for descendant in graph.descendants(name) {
      if matches!(states.get(&descendant), Some(NodeState::Pending)) {
        debug!(
          build_id = %build_id,
          target = %descendant,
          upstream = %name,
          "target_blocked"
        );
        states.insert(
          descendant,
          NodeState::Blocked {
            upstream: name.to_string(),
          },
        );
      }
    }
  }
}

/// Find pending targets whose upstreams have all completed (skipped as
/// current or executed successfully), in topological order.
fn find_ready(pipeline: &Pipeline, states: &HashMap<String, NodeState>) -> Vec<String> {
  pipeline
    .topo
    .iter()
    .filter(|name| matches!(states.get(*name), Some(NodeState::Pending)))
    .filter(|name| {
      pipeline.get(name).is_some_and(|target| {
        target.deps.iter().all(|dep| {
          matches!(
            states.get(dep),
            Some(NodeState::Current | NodeState::Succeeded { .. })
          )
        })
      })
    })
    .cloned()
    .collect()
}

/// Collect the upstream values a target needs, loading stored results for
/// upstreams that were skipped as current.
async fn gather_upstream(
  target: &Target,
  results: &mut HashMap<String, Value>,
  store: &dyn Store,
) -> Result<HashMap<String, Value>, ExecutionError> {
  let mut upstream = HashMap::with_capacity(target.deps.len());
  for dep in &target.deps {
    if !results.contains_key(dep) {
      let value = store.result(dep).await?;
      results.insert(dep.clone(), value);
    }
    if let Some(value) = results.get(dep) {
      upstream.insert(dep.clone(), value.clone());
    }
  }
  Ok(upstream)
}

/// Evaluate a target's expression on a blocking thread; user functions are
/// synchronous and may do real work.
async fn run_target(
  target: &Target,
  upstream: HashMap<String, Value>,
  functions: &Arc<FunctionRegistry>,
) -> Result<Value, ExecutionError> {
  let expr = target.expr.clone();
  let functions = functions.clone();

  info!(target = %target.name, "target_started");

  tokio::task::spawn_blocking(move || evaluate(&expr, &upstream, &functions))
    .await
    .map_err(|e| ExecutionError::Panic {
      message: e.to_string(),
    })?
}

/// Evaluate an expression against upstream results and the function
/// registry.
fn evaluate(
  expr: &Expr,
  upstream: &HashMap<String, Value>,
  functions: &FunctionRegistry,
) -> Result<Value, ExecutionError> {
  match expr {
    Expr::Ref(name) => upstream
      .get(name)
      .cloned()
      .ok_or_else(|| ExecutionError::MissingUpstream { name: name.clone() }),
    Expr::Str(s) => Ok(Value::String(s.clone())),
    Expr::Num(n) => Ok(number(*n)),
    Expr::Call { function, args } => {
      let mut values = Vec::with_capacity(args.len());
      for arg in args {
        values.push(evaluate(arg, upstream, functions)?);
      }
      let spec = functions
        .get(function)
        .ok_or_else(|| ExecutionError::UnknownFunction {
          name: function.clone(),
        })?;
      Ok(spec.call(&values)?)
    }
  }
}

fn number(n: f64) -> Value {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    Value::from(n as i64)
  } else {
    serde_json::Number::from_f64(n)
      .map(Value::Number)
      .unwrap_or(Value::Null)
  }
}

/// Serialize a value for hashing. `serde_json` keeps object keys in
/// insertion order, which is deterministic for values produced by the same
/// expression, so the compact encoding is a usable canonical form.
fn canonical_bytes(value: &Value) -> Vec<u8> {
  serde_json::to_vec(value).unwrap_or_default()
}

fn build_report(
  build_id: &str,
  pipeline: &Pipeline,
  states: &HashMap<String, NodeState>,
) -> BuildReport {
  let targets = pipeline
    .topo
    .iter()
    .map(|name| {
      let outcome = match states.get(name) {
        Some(NodeState::Succeeded { duration_ms }) => TargetOutcome::Executed {
          duration_ms: *duration_ms,
        },
        Some(NodeState::Current) => TargetOutcome::Skipped,
        Some(NodeState::Failed { error }) => TargetOutcome::Failed {
          error: error.clone(),
        },
        Some(NodeState::Blocked { upstream }) => TargetOutcome::Blocked {
          upstream: upstream.clone(),
        },
        // Pending after the loop drains can only mean an ancestor failed
        // before this target was ever scheduled.
        Some(NodeState::Pending) | None => TargetOutcome::Blocked {
          upstream: String::new(),
        },
      };
      TargetReport {
        target: name.clone(),
        outcome,
      }
    })
    .collect();

  BuildReport {
    build_id: build_id.to_string(),
    pipeline: pipeline.name.clone(),
    targets,
  }
}
