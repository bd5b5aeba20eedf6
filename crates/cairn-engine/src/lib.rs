//! Cairn Engine
//!
//! This crate provides the staleness tracker, the executor, and the
//! inspection API for Cairn pipelines.
//!
//! # Architecture
//!
//! ```text
//! Project
//! ├── resolve(def, functions, store_root) - lock the pipeline, bind the store
//! ├── build(cancel) -> BuildReport        - staleness-aware execution pass
//! ├── read(name) -> Value                 - fetch a cached result
//! └── manifest() / graph_dot()            - read-only inspection
//!
//! Executor::execute
//! ├── classify      - per-target stale/current, forward propagation
//! └── batch loop    - run ready stale targets, skip current ones,
//!                     persist per-target, block descendants of failures
//! ```
//!
//! A build pass never aborts on a per-target failure: the failed target is
//! recorded, its descendants are blocked, and independent branches keep
//! executing. Running a second pass with nothing changed re-executes
//! nothing.

mod error;
mod executor;
mod inspect;
mod project;
mod report;
mod staleness;

pub use error::{BuildError, ExecutionError, ReadError};
pub use executor::{EngineConfig, Executor};
pub use inspect::{manifest, render_dot, status_manifest, ManifestEntry, StatusEntry, TargetStatus};
pub use project::Project;
pub use report::{BuildReport, TargetOutcome, TargetReport};
