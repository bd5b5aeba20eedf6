//! Cairn Pipeline
//!
//! This crate provides the locked pipeline representation for Cairn.
//! A locked pipeline is a validated, analyzed form of a pipeline definition
//! that is ready for staleness classification and execution.
//!
//! Key differences from `cairn-config`:
//! - Expressions are parsed into ASTs and their references are extracted
//! - Every target carries a content hash of its definition
//! - The dependency graph is validated (no unknown references, no cycles)
//! - A deterministic topological order is precomputed

mod expr;
mod graph;
mod hash;
mod pipeline;
mod target;

pub use expr::Expr;
pub use graph::Graph;
pub use hash::content_hash;
pub use pipeline::Pipeline;
pub use target::Target;
