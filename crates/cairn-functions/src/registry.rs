use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::FunctionError;

/// A native function callable from a target expression.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// A registered function with its declared arity.
#[derive(Clone)]
pub struct FunctionSpec {
  pub name: String,
  pub arity: usize,
  func: NativeFn,
}

impl FunctionSpec {
  /// Invoke the function. The resolver has already checked the arity.
  pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
    debug_assert_eq!(args.len(), self.arity, "arity checked at resolve time");
    (self.func)(args)
  }
}

impl std::fmt::Debug for FunctionSpec {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FunctionSpec")
      .field("name", &self.name)
      .field("arity", &self.arity)
      .finish()
  }
}

/// Registry of named functions, populated once at process start.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
  functions: HashMap<String, FunctionSpec>,
}

impl FunctionRegistry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a registry pre-populated with the built-in table functions.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    crate::builtins::register_builtins(&mut registry);
    registry
  }

  /// Register a function under `name` with the given arity.
  ///
  /// Re-registering a name replaces the previous function.
  pub fn register<F>(&mut self, name: &str, arity: usize, func: F)
  where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
  {
    self.functions.insert(
      name.to_string(),
      FunctionSpec {
        name: name.to_string(),
        arity,
        func: Arc::new(func),
      },
    );
  }

  /// Look up a function by name.
  pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
    self.functions.get(name)
  }

  /// Whether a function with this name is registered.
  pub fn contains(&self, name: &str) -> bool {
    self.functions.contains_key(name)
  }
}
