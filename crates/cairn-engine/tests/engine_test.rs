//! Integration tests for the build engine: incremental execution,
//! staleness propagation, and failure isolation, end to end against a
//! filesystem store.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cairn_config::{PipelineDef, TargetDef};
use cairn_engine::{BuildReport, EngineConfig, Project, ReadError, TargetOutcome, TargetStatus};
use cairn_functions::{FunctionError, FunctionRegistry};
use cairn_store::{FsStore, Store};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn target(name: &str, expr: &str) -> TargetDef {
  TargetDef {
    name: name.to_string(),
    expr: expr.to_string(),
    files: vec![],
  }
}

fn file_target(name: &str, expr: &str, file: &Path) -> TargetDef {
  TargetDef {
    name: name.to_string(),
    expr: expr.to_string(),
    files: vec![file.to_path_buf()],
  }
}

fn def(targets: Vec<TargetDef>) -> PipelineDef {
  PipelineDef {
    name: "test".to_string(),
    targets,
  }
}

fn outcome<'a>(report: &'a BuildReport, name: &str) -> &'a TargetOutcome {
  &report
    .targets
    .iter()
    .find(|t| t.target == name)
    .unwrap_or_else(|| panic!("target '{}' missing from report", name))
    .outcome
}

fn executed(report: &BuildReport) -> Vec<&str> {
  report
    .targets
    .iter()
    .filter(|t| matches!(t.outcome, TargetOutcome::Executed { .. }))
    .map(|t| t.target.as_str())
    .collect()
}

async fn build(project: &Project) -> BuildReport {
  project.build(CancellationToken::new()).await.unwrap()
}

/// Spec scenario: load a 3-row table, double a column, sum it; change the
/// input and rebuild; rebuild again unchanged.
#[tokio::test]
async fn scenario_load_double_summarize() {
  let dir = tempfile::tempdir().unwrap();
  let data = dir.path().join("data.csv");
  let store_root = dir.path().join("store");
  std::fs::write(&data, "value\n1\n2\n3\n").unwrap();

  let def = def(vec![
    file_target(
      "load",
      &format!(r#"read_csv("{}")"#, data.display()),
      &data,
    ),
    target("double", r#"scale_column(load, "value", 2)"#),
    target("summarize", r#"sum_column(double, "value")"#),
  ]);

  let project = Project::resolve(
    &def,
    FunctionRegistry::with_builtins(),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();

  let report = build(&project).await;
  assert!(report.is_success());
  assert_eq!(report.executed_count(), 3);

  let double: Value = project.read("double").await.unwrap();
  let column: Vec<i64> = double
    .as_array()
    .unwrap()
    .iter()
    .map(|row| row["value"].as_i64().unwrap())
    .collect();
  assert_eq!(column, vec![2, 4, 6]);
  assert_eq!(project.read("summarize").await.unwrap(), json!(12));

  // Idempotence: nothing changed, nothing re-executes.
  let report = build(&project).await;
  assert_eq!(report.executed_count(), 0);
  assert_eq!(report.skipped_count(), 3);

  // Changing the input file re-executes the whole chain.
  std::fs::write(&data, "value\n10\n20\n30\n").unwrap();
  let report = build(&project).await;
  assert_eq!(report.executed_count(), 3);
  assert_eq!(project.read("summarize").await.unwrap(), json!(120));

  // And settles again.
  let report = build(&project).await;
  assert_eq!(report.executed_count(), 0);
}

/// Changing one target's definition re-executes it and every descendant,
/// even though the descendants' own definitions are unchanged.
#[tokio::test]
async fn forward_propagation_on_definition_change() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let bumps = Arc::new(AtomicUsize::new(0));
  let registry = || {
    let bumps = bumps.clone();
    let mut registry = FunctionRegistry::new();
    registry.register("seed", 0, |_| Ok(json!(1)));
    registry.register("seed_v2", 0, |_| Ok(json!(100)));
    registry.register("bump", 1, move |args| {
      bumps.fetch_add(1, Ordering::SeqCst);
      Ok(json!(args[0].as_i64().unwrap_or(0) + 1))
    });
    registry
  };

  let chain = |head: &str| {
    def(vec![
      target("a", head),
      target("b", "bump(a)"),
      target("c", "bump(b)"),
    ])
  };

  let project = Project::resolve(
    &chain("seed()"),
    registry(),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();
  let report = build(&project).await;
  assert_eq!(report.executed_count(), 3);
  assert_eq!(bumps.load(Ordering::SeqCst), 2);
  assert_eq!(project.read("c").await.unwrap(), json!(3));

  // Same definitions: everything is current.
  let project = Project::resolve(
    &chain("seed()"),
    registry(),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();
  assert_eq!(build(&project).await.executed_count(), 0);
  assert_eq!(bumps.load(Ordering::SeqCst), 2);

  // Redefine the root: all three re-execute.
  let project = Project::resolve(
    &chain("seed_v2()"),
    registry(),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();
  let report = build(&project).await;
  assert_eq!(report.executed_count(), 3);
  assert_eq!(bumps.load(Ordering::SeqCst), 4);
  assert_eq!(project.read("c").await.unwrap(), json!(102));
}

fn diamond_registry(fail_b: bool) -> FunctionRegistry {
  let mut registry = FunctionRegistry::new();
  registry.register("seed", 0, |_| Ok(json!(1)));
  registry.register("bump", 1, |args| Ok(json!(args[0].as_i64().unwrap_or(0) + 1)));
  registry.register("shaky", 1, move |args| {
    if fail_b {
      Err(FunctionError::BadArgument {
        function: "shaky".to_string(),
        message: "induced failure".to_string(),
      })
    } else {
      Ok(json!(args[0].as_i64().unwrap_or(0) + 10))
    }
  });
  registry
}

/// Diamond-ish graph a -> b, a -> c, b -> d, c -> e where b fails:
/// d is blocked, e still completes; unrelated branches are isolated.
#[tokio::test]
async fn partial_failure_isolates_branches() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let graph = def(vec![
    target("a", "seed()"),
    target("b", "shaky(a)"),
    target("c", "bump(a)"),
    target("d", "bump(b)"),
    target("e", "bump(c)"),
  ]);

  let project = Project::resolve(
    &graph,
    diamond_registry(true),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();
  let report = build(&project).await;

  assert!(!report.is_success());
  assert!(matches!(outcome(&report, "a"), TargetOutcome::Executed { .. }));
  assert!(matches!(outcome(&report, "b"), TargetOutcome::Failed { error } if error.contains("induced failure")));
  assert!(matches!(outcome(&report, "c"), TargetOutcome::Executed { .. }));
  assert!(
    matches!(outcome(&report, "d"), TargetOutcome::Blocked { upstream } if upstream == "b")
  );
  assert!(matches!(outcome(&report, "e"), TargetOutcome::Executed { .. }));

  // The healthy branch is readable, the blocked one is not.
  assert_eq!(project.read("e").await.unwrap(), json!(3));
  assert!(matches!(
    project.read("d").await,
    Err(ReadError::NotFound(_))
  ));

  // Status projection shows the failure and the blockage.
  let statuses = project.statuses().await;
  assert_eq!(statuses["b"], TargetStatus::Error);
  assert_eq!(statuses["d"], TargetStatus::Blocked);
  assert_eq!(statuses["e"], TargetStatus::Current);

  // After the fix, only the previously failed/blocked subgraph re-runs.
  let project = Project::resolve(
    &graph,
    diamond_registry(false),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();
  let report = build(&project).await;
  assert!(report.is_success());
  let mut rerun = executed(&report);
  rerun.sort();
  assert_eq!(rerun, vec!["b", "d"]);
  assert_eq!(project.read("d").await.unwrap(), json!(12));
}

/// If an upstream target re-ran since this target's last successful run
/// (out of band, between passes), the recorded upstream result hash no
/// longer matches and the target re-executes.
#[tokio::test]
async fn upstream_rerun_between_passes_marks_downstream_stale() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let mut registry = FunctionRegistry::new();
  registry.register("seed", 0, |_| Ok(json!(5)));
  registry.register("bump", 1, |args| Ok(json!(args[0].as_i64().unwrap_or(0) + 1)));

  let graph = def(vec![target("a", "seed()"), target("b", "bump(a)")]);
  let project =
    Project::resolve(&graph, registry, &store_root, EngineConfig::default()).unwrap();
  assert_eq!(build(&project).await.executed_count(), 2);

  // Rewrite a's stored entry with a different result, as if it re-ran out
  // of band: same definition hash, new result hash.
  let store = FsStore::new(&store_root);
  let mut record = store.record("a").await.unwrap().unwrap();
  record.result_hash = Some("sha256:out-of-band".to_string());
  store.put(&record, Some(&json!(50))).await.unwrap();

  let report = build(&project).await;
  assert_eq!(executed(&report), vec!["b"]);
  assert_eq!(project.read("b").await.unwrap(), json!(51));
}

/// If b depends on a, a's run record is committed before b starts.
#[tokio::test]
async fn dependency_records_complete_in_order() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let mut registry = FunctionRegistry::new();
  registry.register("seed", 0, |_| Ok(json!(1)));
  registry.register("bump", 1, |args| Ok(json!(args[0].as_i64().unwrap_or(0) + 1)));

  let project = Project::resolve(
    &def(vec![target("a", "seed()"), target("b", "bump(a)")]),
    registry,
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();
  build(&project).await;

  let store = FsStore::new(&store_root);
  let a = store.record("a").await.unwrap().unwrap();
  let b = store.record("b").await.unwrap().unwrap();
  assert!(a.completed_at <= b.completed_at);
  assert!(b.dep_hashes.get("a") == a.result_hash.as_ref());
}

#[tokio::test]
async fn read_errors_distinguish_unknown_and_never_built() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let mut registry = FunctionRegistry::new();
  registry.register("seed", 0, |_| Ok(json!(1)));

  let project = Project::resolve(
    &def(vec![target("a", "seed()")]),
    registry,
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();

  assert!(matches!(
    project.read("nope").await,
    Err(ReadError::UnknownTarget(_))
  ));
  assert!(matches!(
    project.read("a").await,
    Err(ReadError::NotFound(_))
  ));
}

/// Independent targets run correctly under a bounded worker pool, and a
/// sequential pool of one behaves identically.
#[tokio::test]
async fn parallel_mode_bounded_workers() {
  for max_workers in [Some(1), Some(2), None] {
    let dir = tempfile::tempdir().unwrap();
    let store_root = dir.path().join("store");

    let mut registry = FunctionRegistry::new();
    registry.register("seed", 0, |_| Ok(json!(2)));
    registry.register("bump", 1, |args| Ok(json!(args[0].as_i64().unwrap_or(0) + 1)));
    registry.register("merge", 2, |args| {
      Ok(json!(
        args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0)
      ))
    });

    let project = Project::resolve(
      &def(vec![
        target("base", "seed()"),
        target("left", "bump(base)"),
        target("right", "bump(base)"),
        target("join", "merge(left, right)"),
      ]),
      registry,
      &store_root,
      EngineConfig { max_workers },
    )
    .unwrap();

    let report = build(&project).await;
    assert!(report.is_success(), "workers={:?}", max_workers);
    assert_eq!(report.executed_count(), 4);
    assert_eq!(project.read("join").await.unwrap(), json!(6));
  }
}

#[tokio::test]
async fn cancelled_build_schedules_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let mut registry = FunctionRegistry::new();
  registry.register("seed", 0, |_| Ok(json!(1)));

  let project = Project::resolve(
    &def(vec![target("a", "seed()")]),
    registry,
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();

  let cancel = CancellationToken::new();
  cancel.cancel();
  let err = project.build(cancel).await.unwrap_err();
  assert_eq!(err.to_string(), "build cancelled");

  // Nothing was scheduled, so nothing was persisted.
  let store = FsStore::new(&store_root);
  assert!(store.record("a").await.unwrap().is_none());
}

/// A missing declared input file fails that target at run time and blocks
/// its descendants; the failure is isolated.
#[tokio::test]
async fn missing_input_file_fails_in_isolation() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");
  let ghost = dir.path().join("ghost.csv");

  // "other" gets a real file so only the ghost branch fails.
  let other_path = dir.path().join("other.json");
  std::fs::write(&other_path, "[1, 2]").unwrap();

  let graph = def(vec![
    file_target("load", &format!(r#"read_csv("{}")"#, ghost.display()), &ghost),
    target("count", "count_rows(load)"),
    target("other", &format!(r#"read_json("{}")"#, other_path.display())),
  ]);

  let project = Project::resolve(
    &graph,
    FunctionRegistry::with_builtins(),
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();

  let report = build(&project).await;
  assert!(matches!(outcome(&report, "load"), TargetOutcome::Failed { .. }));
  assert!(
    matches!(outcome(&report, "count"), TargetOutcome::Blocked { upstream } if upstream == "load")
  );
  assert!(matches!(outcome(&report, "other"), TargetOutcome::Executed { .. }));
  assert_eq!(project.read("other").await.unwrap(), json!([1, 2]));
}

/// The graph rendering reflects a fresh classification.
#[tokio::test]
async fn graph_dot_reflects_staleness() {
  let dir = tempfile::tempdir().unwrap();
  let store_root = dir.path().join("store");

  let mut registry = FunctionRegistry::new();
  registry.register("seed", 0, |_| Ok(json!(1)));
  registry.register("bump", 1, |args| Ok(json!(args[0].as_i64().unwrap_or(0) + 1)));

  let project = Project::resolve(
    &def(vec![target("a", "seed()"), target("b", "bump(a)")]),
    registry,
    &store_root,
    EngineConfig::default(),
  )
  .unwrap();

  // Before any build: everything stale.
  let dot = project.graph_dot().await;
  assert!(dot.contains("\"a\" [fillcolor=orange];"));
  assert!(dot.contains("\"b\" [fillcolor=orange];"));
  assert!(dot.contains("\"a\" -> \"b\";"));

  build(&project).await;

  let dot = project.graph_dot().await;
  assert!(dot.contains("\"a\" [fillcolor=palegreen];"));
  assert!(dot.contains("\"b\" [fillcolor=palegreen];"));
}
