//! Cairn Functions
//!
//! This crate provides the function registry: the set of named native
//! functions that target expressions may call. Functions are registered
//! once at process start with a declared arity, take `serde_json::Value`
//! arguments, and return a `serde_json::Value` result.
//!
//! The registry replaces ambient-workspace lookup: a target can only reach
//! data through its expression's arguments, and an expression can only call
//! functions the registry knows about — the resolver rejects anything else
//! before execution begins.
//!
//! `builtins` contains the small demonstration set the CLI registers
//! (CSV/JSON loading and simple column arithmetic). The engine itself never
//! depends on them; embedding callers register their own functions.

pub mod builtins;
mod error;
mod registry;

pub use error::FunctionError;
pub use registry::{FunctionRegistry, FunctionSpec, NativeFn};
