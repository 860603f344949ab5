//! Row access helpers
//!
//! Rows are JSON-like values owned by the backing store. Columns only read
//! them through these helpers and never mutate them.

use serde_json::Value;

/// A borrowed row together with its position in the backing store
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    /// Index of the row in the backing store
    pub index: usize,
    /// The row payload
    pub value: &'a Value,
}

impl<'a> DataRow<'a> {
    pub fn new(index: usize, value: &'a Value) -> Self {
        Self { index, value }
    }

    /// Look up a field of an object row, `None` for absent fields or non-object rows
    pub fn field(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key)
    }
}

/// Convert a single cell into a number, NaN when it is not numeric
pub fn as_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Flatten a possibly array-valued cell into its valid numbers
///
/// Non-numeric entries are dropped.
pub fn as_numbers(value: Option<&Value>) -> Vec<f64> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| as_number(Some(v)))
            .filter(|v| !v.is_nan())
            .collect(),
        other => {
            let v = as_number(other);
            if v.is_nan() {
                Vec::new()
            } else {
                vec![v]
            }
        }
    }
}

/// Text representation of a cell, `None` for null, absent or empty cells
pub fn as_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    }
}
