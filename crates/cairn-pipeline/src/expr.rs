use std::fmt;

use serde::{Deserialize, Serialize};

/// A parsed target expression.
///
/// Expressions are built by the resolver's static analysis and evaluated
/// only by the executor. Bare identifiers (`Ref`) are references to other
/// targets; the call head names a registered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
  /// A function invocation: `scale_column(load, "value", 2)`.
  Call { function: String, args: Vec<Expr> },
  /// A reference to another target's result, by name.
  Ref(String),
  /// A string literal.
  Str(String),
  /// A numeric literal.
  Num(f64),
}

impl Expr {
  /// Collect the target names this expression references, in order of
  /// first occurrence, deduplicated.
  pub fn references(&self) -> Vec<String> {
    let mut out = Vec::new();
    self.collect_references(&mut out);
    out
  }

  fn collect_references(&self, out: &mut Vec<String>) {
    match self {
      Expr::Ref(name) => {
        if !out.iter().any(|n| n == name) {
          out.push(name.clone());
        }
      }
      Expr::Call { args, .. } => {
        for arg in args {
          arg.collect_references(out);
        }
      }
      Expr::Str(_) | Expr::Num(_) => {}
    }
  }
}

/// Canonical rendering. Definition hashes are computed over this form, so
/// it must be deterministic: one space after commas, integral numbers
/// without a fractional part, strings re-escaped.
impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expr::Call { function, args } => {
        write!(f, "{}(", function)?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", arg)?;
        }
        write!(f, ")")
      }
      Expr::Ref(name) => write!(f, "{}", name),
      Expr::Str(s) => {
        write!(f, "\"")?;
        for c in s.chars() {
          match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
          }
        }
        write!(f, "\"")
      }
      Expr::Num(n) => {
        if n.fract() == 0.0 && n.abs() < 1e15 {
          write!(f, "{}", *n as i64)
        } else {
          write!(f, "{}", n)
        }
      }
    }
  }
}
