//! The `Project` facade.
//!
//! Owns a resolved pipeline, the function registry, and the durable store,
//! and exposes the three caller-facing operations: `build()`, `read()`,
//! and inspection (`manifest()` / `graph_dot()`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use cairn_config::PipelineDef;
use cairn_functions::FunctionRegistry;
use cairn_pipeline::Pipeline;
use cairn_resolver::{ResolveError, Resolver};
use cairn_store::{FsStore, Store};
use tokio_util::sync::CancellationToken;

use crate::error::{BuildError, ReadError};
use crate::executor::{EngineConfig, Executor};
use crate::inspect::{self, ManifestEntry, StatusEntry, TargetStatus};
use crate::report::BuildReport;

/// A resolved pipeline bound to its functions and store.
pub struct Project {
  pipeline: Pipeline,
  functions: Arc<FunctionRegistry>,
  store: Arc<dyn Store>,
  config: EngineConfig,
}

impl Project {
  /// Create a project from an already-locked pipeline.
  pub fn new(
    pipeline: Pipeline,
    functions: FunctionRegistry,
    store: impl Store + 'static,
    config: EngineConfig,
  ) -> Self {
    Self {
      pipeline,
      functions: Arc::new(functions),
      store: Arc::new(store),
      config,
    }
  }

  /// Resolve a pipeline definition and bind it to a filesystem store.
  ///
  /// Structural errors (parse failures, undeclared references, cycles)
  /// surface here, before anything executes.
  pub fn resolve(
    def: &PipelineDef,
    functions: FunctionRegistry,
    store_root: impl Into<PathBuf>,
    config: EngineConfig,
  ) -> Result<Self, ResolveError> {
    let pipeline = Resolver::new(&functions).resolve(def)?;
    Ok(Self::new(pipeline, functions, FsStore::new(store_root), config))
  }

  /// The locked pipeline.
  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  /// Run one staleness-aware build pass.
  pub async fn build(&self, cancel: CancellationToken) -> Result<BuildReport, BuildError> {
    Executor::new(self.config.clone())
      .execute(
        &self.pipeline,
        self.functions.clone(),
        self.store.clone(),
        cancel,
      )
      .await
  }

  /// Fetch the cached result of a target.
  pub async fn read(&self, name: &str) -> Result<serde_json::Value, ReadError> {
    if !self.pipeline.contains(name) {
      return Err(ReadError::UnknownTarget(name.to_string()));
    }
    self.store.result(name).await.map_err(|e| match e {
      cairn_store::Error::NotFound(name) => ReadError::NotFound(name),
      other => ReadError::Store(other),
    })
  }

  /// The declared target list with dependency edges. No execution.
  pub fn manifest(&self) -> Vec<ManifestEntry> {
    inspect::manifest(&self.pipeline)
  }

  /// The manifest with per-target staleness status.
  pub async fn status_manifest(&self) -> Vec<StatusEntry> {
    inspect::status_manifest(&self.pipeline, self.store.as_ref()).await
  }

  /// Per-target display statuses from a fresh classification.
  pub async fn statuses(&self) -> HashMap<String, TargetStatus> {
    inspect::statuses(&self.pipeline, self.store.as_ref()).await
  }

  /// Render the dependency graph as Graphviz DOT with status coloring.
  pub async fn graph_dot(&self) -> String {
    let statuses = self.statuses().await;
    inspect::render_dot(&self.pipeline, &statuses)
  }
}
