use std::collections::{HashMap, HashSet};

use cairn_config::PipelineDef;
use cairn_functions::FunctionRegistry;
use cairn_pipeline::{Expr, Pipeline, Target};

use crate::analyze;
use crate::error::ResolveError;

/// Resolver transforms a `PipelineDef` into a locked `Pipeline`.
///
/// This process:
/// 1. Parses every target expression (statically — nothing is evaluated)
/// 2. Validates references against the declared targets and the function
///    registry
/// 3. Detects cycles, reporting the cycle path
/// 4. Computes a deterministic topological order
pub struct Resolver<'a> {
  functions: &'a FunctionRegistry,
}

impl<'a> Resolver<'a> {
  /// Create a new resolver over the given function registry.
  pub fn new(functions: &'a FunctionRegistry) -> Self {
    Self { functions }
  }

  /// Resolve a pipeline definition into a locked pipeline.
  pub fn resolve(&self, def: &PipelineDef) -> Result<Pipeline, ResolveError> {
    let declared = self.declared_names(def)?;

    // Parse and validate every expression, locking targets as we go.
    let mut targets = Vec::with_capacity(def.targets.len());
    for target_def in &def.targets {
      let expr =
        analyze::parse(&target_def.expr).map_err(|e| ResolveError::Parse {
          target: target_def.name.clone(),
          position: e.position,
          message: e.message,
        })?;
      self.validate_expr(&target_def.name, &expr, &declared)?;
      targets.push(Target::new(
        target_def.name.clone(),
        expr,
        target_def.files.clone(),
      ));
    }

    // Edges: one per inferred (upstream, downstream) pair.
    let mut edges = Vec::new();
    for target in &targets {
      for dep in &target.deps {
        edges.push((dep.clone(), target.name.clone()));
      }
    }

    self.detect_cycle(&targets, &edges)?;
    let topo = topological_order(&targets, &edges);

    Ok(Pipeline {
      name: def.name.clone(),
      targets,
      edges,
      topo,
    })
  }

  /// Collect declared target names, rejecting duplicates.
  fn declared_names(&self, def: &PipelineDef) -> Result<HashSet<String>, ResolveError> {
    let mut declared = HashSet::new();
    for target in &def.targets {
      if !declared.insert(target.name.clone()) {
        return Err(ResolveError::DuplicateTarget {
          name: target.name.clone(),
        });
      }
    }
    Ok(declared)
  }

  /// Validate every identifier in an expression: call heads must name
  /// registered functions with matching arity, bare references must name
  /// declared targets.
  fn validate_expr(
    &self,
    target: &str,
    expr: &Expr,
    declared: &HashSet<String>,
  ) -> Result<(), ResolveError> {
    match expr {
      Expr::Call { function, args } => {
        let spec =
          self
            .functions
            .get(function)
            .ok_or_else(|| ResolveError::UnknownFunction {
              target: target.to_string(),
              function: function.clone(),
            })?;
        if spec.arity != args.len() {
          return Err(ResolveError::ArityMismatch {
            target: target.to_string(),
            function: function.clone(),
            expected: spec.arity,
            got: args.len(),
          });
        }
        for arg in args {
          self.validate_expr(target, arg, declared)?;
        }
        Ok(())
      }
      Expr::Ref(name) => {
        if declared.contains(name) {
          Ok(())
        } else {
          Err(ResolveError::UndeclaredReference {
            target: target.to_string(),
            reference: name.clone(),
          })
        }
      }
      Expr::Str(_) | Expr::Num(_) => Ok(()),
    }
  }

  /// Check for cycles using DFS with tricolor marking, reporting the cycle
  /// as a closed walk.
  fn detect_cycle(
    &self,
    targets: &[Target],
    edges: &[(String, String)],
  ) -> Result<(), ResolveError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for target in targets {
      adjacency.insert(target.name.as_str(), Vec::new());
    }
    for (from, to) in edges {
      if let Some(neighbors) = adjacency.get_mut(from.as_str()) {
        neighbors.push(to.as_str());
      }
    }

    // 0 = white (unvisited), 1 = gray (on the current path), 2 = black (done)
    let mut color: HashMap<&str, u8> =
      targets.iter().map(|t| (t.name.as_str(), 0u8)).collect();

    fn dfs<'a>(
      node: &'a str,
      adjacency: &HashMap<&str, Vec<&'a str>>,
      color: &mut HashMap<&'a str, u8>,
      path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, 1);
      path.push(node);

      if let Some(neighbors) = adjacency.get(node) {
        for &neighbor in neighbors {
          match color.get(neighbor) {
            // Back edge: the cycle runs from the gray node to here.
            Some(1) => {
              let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
              let mut cycle: Vec<String> =
                path[start..].iter().map(|n| n.to_string()).collect();
              cycle.push(neighbor.to_string());
              return Some(cycle);
            }
            Some(0) => {
              if let Some(cycle) = dfs(neighbor, adjacency, color, path) {
                return Some(cycle);
              }
            }
            _ => {}
          }
        }
      }

      path.pop();
      color.insert(node, 2);
      None
    }

    // Iterate in declaration order so the reported cycle is deterministic.
    let mut path = Vec::new();
    for target in targets {
      if color.get(target.name.as_str()) == Some(&0)
        && let Some(cycle) = dfs(target.name.as_str(), &adjacency, &mut color, &mut path)
      {
        return Err(ResolveError::CycleDetected { path: cycle });
      }
    }

    Ok(())
  }
}

/// Kahn's algorithm with declaration-order tie-breaks: among ready targets,
/// the one declared first comes first. Assumes the cycle check has passed.
fn topological_order(targets: &[Target], edges: &[(String, String)]) -> Vec<String> {
  let mut indegree: HashMap<&str, usize> =
    targets.iter().map(|t| (t.name.as_str(), 0)).collect();
  for (_, to) in edges {
    if let Some(d) = indegree.get_mut(to.as_str()) {
      *d += 1;
    }
  }

  let mut done: HashSet<&str> = HashSet::new();
  let mut topo = Vec::with_capacity(targets.len());

  while topo.len() < targets.len() {
    // Declaration-order scan keeps the order deterministic; pipelines are
    // small enough that the quadratic scan is irrelevant.
    let next = targets
      .iter()
      .map(|t| t.name.as_str())
      .find(|name| !done.contains(name) && indegree[name] == 0);

    let Some(name) = next else {
      // Unreachable after the cycle check.
      break;
    };

    done.insert(name);
    topo.push(name.to_string());
    for (from, to) in edges {
      if from.as_str() == name
        && let Some(d) = indegree.get_mut(to.as_str())
      {
        *d -= 1;
      }
    }
  }

  topo
}
