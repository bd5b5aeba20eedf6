//! Built-in table functions.
//!
//! Thin glue over `csv` and `serde_json` for tutorial-style pipelines:
//! load a table, derive a column, summarize. Tables are JSON arrays of
//! objects; numeric CSV fields are parsed into numbers on load.

use std::fs::File;
use std::io::BufReader;

use serde_json::{Map, Value};

use crate::error::FunctionError;
use crate::registry::FunctionRegistry;

/// Register the built-in functions. Called by the CLI; embedding callers
/// can mix these with their own registrations.
pub fn register_builtins(registry: &mut FunctionRegistry) {
  registry.register("read_csv", 1, read_csv);
  registry.register("read_json", 1, read_json);
  registry.register("scale_column", 3, scale_column);
  registry.register("sum_column", 2, sum_column);
  registry.register("count_rows", 1, count_rows);
  registry.register("select_column", 2, select_column);
}

/// `read_csv(path)` — parse a headered CSV file into an array of objects.
/// Fields that parse as numbers become numbers, everything else stays a
/// string.
fn read_csv(args: &[Value]) -> Result<Value, FunctionError> {
  let path = string_arg("read_csv", args, 0)?;
  let mut reader = csv::Reader::from_path(path)?;
  let headers = reader.headers()?.clone();

  let mut rows = Vec::new();
  for record in reader.records() {
    let record = record?;
    let mut row = Map::new();
    for (header, field) in headers.iter().zip(record.iter()) {
      let value = match field.parse::<f64>() {
        Ok(n) => num_value(n),
        Err(_) => Value::String(field.to_string()),
      };
      row.insert(header.to_string(), value);
    }
    rows.push(Value::Object(row));
  }
  Ok(Value::Array(rows))
}

/// `read_json(path)` — parse a JSON file into a value.
fn read_json(args: &[Value]) -> Result<Value, FunctionError> {
  let path = string_arg("read_json", args, 0)?;
  let file = File::open(path)?;
  Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// `scale_column(table, column, factor)` — multiply a numeric column,
/// leaving other columns untouched.
fn scale_column(args: &[Value]) -> Result<Value, FunctionError> {
  const NAME: &str = "scale_column";
  let rows = table_arg(NAME, args, 0)?;
  let column = string_arg(NAME, args, 1)?;
  let factor = number_arg(NAME, args, 2)?;

  let mut out = Vec::with_capacity(rows.len());
  for row in rows {
    let mut row = object_row(NAME, row)?.clone();
    let cell = column_number(NAME, &row, column)?;
    row.insert(column.to_string(), num_value(cell * factor));
    out.push(Value::Object(row));
  }
  Ok(Value::Array(out))
}

/// `sum_column(table, column)` — sum a numeric column.
fn sum_column(args: &[Value]) -> Result<Value, FunctionError> {
  const NAME: &str = "sum_column";
  let rows = table_arg(NAME, args, 0)?;
  let column = string_arg(NAME, args, 1)?;

  let mut sum = 0.0;
  for row in rows {
    let row = object_row(NAME, row)?;
    sum += column_number(NAME, row, column)?;
  }
  Ok(num_value(sum))
}

/// `count_rows(table)` — number of rows.
fn count_rows(args: &[Value]) -> Result<Value, FunctionError> {
  let rows = table_arg("count_rows", args, 0)?;
  Ok(Value::from(rows.len()))
}

/// `select_column(table, column)` — project one column as an array.
fn select_column(args: &[Value]) -> Result<Value, FunctionError> {
  const NAME: &str = "select_column";
  let rows = table_arg(NAME, args, 0)?;
  let column = string_arg(NAME, args, 1)?;

  let mut out = Vec::with_capacity(rows.len());
  for row in rows {
    let row = object_row(NAME, row)?;
    let cell = row.get(column).ok_or_else(|| FunctionError::MissingColumn {
      function: NAME.to_string(),
      column: column.to_string(),
    })?;
    out.push(cell.clone());
  }
  Ok(Value::Array(out))
}

/// Render a float as an integer when it is integral, so scaled integer
/// columns stay integers.
fn num_value(n: f64) -> Value {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    Value::from(n as i64)
  } else {
    serde_json::Number::from_f64(n)
      .map(Value::Number)
      .unwrap_or(Value::Null)
  }
}

fn string_arg<'a>(
  function: &str,
  args: &'a [Value],
  index: usize,
) -> Result<&'a str, FunctionError> {
  args[index]
    .as_str()
    .ok_or_else(|| FunctionError::BadArgument {
      function: function.to_string(),
      message: format!("argument {} must be a string", index + 1),
    })
}

fn number_arg(function: &str, args: &[Value], index: usize) -> Result<f64, FunctionError> {
  args[index]
    .as_f64()
    .ok_or_else(|| FunctionError::BadArgument {
      function: function.to_string(),
      message: format!("argument {} must be a number", index + 1),
    })
}

fn table_arg<'a>(
  function: &str,
  args: &'a [Value],
  index: usize,
) -> Result<&'a Vec<Value>, FunctionError> {
  args[index]
    .as_array()
    .ok_or_else(|| FunctionError::BadArgument {
      function: function.to_string(),
      message: format!("argument {} must be a table (array of objects)", index + 1),
    })
}

fn object_row<'a>(
  function: &str,
  row: &'a Value,
) -> Result<&'a Map<String, Value>, FunctionError> {
  row.as_object().ok_or_else(|| FunctionError::BadArgument {
    function: function.to_string(),
    message: "table rows must be objects".to_string(),
  })
}

fn column_number(
  function: &str,
  row: &Map<String, Value>,
  column: &str,
) -> Result<f64, FunctionError> {
  let cell = row.get(column).ok_or_else(|| FunctionError::MissingColumn {
    function: function.to_string(),
    column: column.to_string(),
  })?;
  cell.as_f64().ok_or_else(|| FunctionError::BadArgument {
    function: function.to_string(),
    message: format!("column '{}' is not numeric", column),
  })
}
