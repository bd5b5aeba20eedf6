//! Cairn Config
//!
//! This crate contains the serializable pipeline definition types for Cairn.
//! These types represent a pipeline as declared by the user, before the
//! resolver analyzes expressions and locks the dependency graph.
//!
//! Definitions can be loaded from:
//! - JSON files (via CLI with `cairn build pipeline.json`)
//! - Embedding callers that construct them in code
//!
//! The resolver takes these definition types, parses each target's
//! expression, validates every reference, and produces a locked pipeline
//! ready for execution.

mod pipeline;
mod target;

pub use pipeline::PipelineDef;
pub use target::TargetDef;
