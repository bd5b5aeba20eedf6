use serde::{Deserialize, Serialize};

use crate::target::TargetDef;

/// A pipeline definition as declared by the user.
///
/// Target order is semantic: when several targets become ready at the same
/// time, the one declared first executes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub name: String,
  pub targets: Vec<TargetDef>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_minimal_pipeline() {
    let json = r#"{
      "name": "demo",
      "targets": [
        { "name": "load", "expr": "read_csv(\"data.csv\")", "files": ["data.csv"] },
        { "name": "double", "expr": "scale_column(load, \"value\", 2)" }
      ]
    }"#;

    let def: PipelineDef = serde_json::from_str(json).unwrap();
    assert_eq!(def.name, "demo");
    assert_eq!(def.targets.len(), 2);
    assert_eq!(def.targets[0].files.len(), 1);
    assert!(def.targets[1].files.is_empty());
  }

  #[test]
  fn files_default_to_empty() {
    let json = r#"{ "name": "t", "expr": "count_rows(t2)" }"#;
    let def: TargetDef = serde_json::from_str(json).unwrap();
    assert!(def.files.is_empty());
  }
}
