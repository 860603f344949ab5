//! Extension point for column types outside the built-in set
//!
//! An extension column is registered under its type tag with a
//! [`ColumnExtensionFactory`] and otherwise behaves like a leaf column.

use std::cmp::Ordering;
use std::fmt::Debug;

use serde_json::Value;

use crate::desc::ColumnDesc;
use crate::value::DataRow;

/// Behavior of a custom leaf column
///
/// Every method receives the descriptor the column was created from. Only
/// `raw` and `compare` are required; the defaults describe an unfiltered,
/// non-numeric column.
pub trait ColumnExtension: Debug + Send + Sync {
    /// Raw cell value
    fn raw(&self, desc: &ColumnDesc, row: &DataRow) -> Value;

    /// Ascending comparison of two non-missing rows
    fn compare(&self, desc: &ColumnDesc, a: &DataRow, b: &DataRow) -> Ordering;

    fn is_missing(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        self.raw(desc, row).is_null()
    }

    fn label(&self, desc: &ColumnDesc, row: &DataRow) -> Option<String> {
        match self.raw(desc, row) {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn is_numeric(&self) -> bool {
        false
    }

    /// Normalized value in `[0, 1]` for numeric extensions
    fn number(&self, _desc: &ColumnDesc, _row: &DataRow) -> f64 {
        f64::NAN
    }

    fn matches(&self, _desc: &ColumnDesc, _row: &DataRow) -> bool {
        true
    }

    fn is_filtered(&self) -> bool {
        false
    }

    fn filter(&self) -> Option<Value> {
        None
    }

    /// Replace the filter; returns whether it changed
    fn set_filter(&mut self, _filter: Option<Value>) -> Result<bool, String> {
        Err("filtering is not supported".to_string())
    }

    /// Extension state stored in the column dump
    fn dump(&self) -> Option<Value> {
        None
    }

    fn restore(&mut self, _state: &Value) {}
}

/// Creates extension columns from descriptors
pub trait ColumnExtensionFactory: Send + Sync {
    fn create(&self, desc: &ColumnDesc) -> Box<dyn ColumnExtension>;
}

impl<F> ColumnExtensionFactory for F
where
    F: Fn(&ColumnDesc) -> Box<dyn ColumnExtension> + Send + Sync,
{
    fn create(&self, desc: &ColumnDesc) -> Box<dyn ColumnExtension> {
        self(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Length;

    impl ColumnExtension for Length {
        fn raw(&self, desc: &ColumnDesc, row: &DataRow) -> Value {
            let field = desc.column.as_deref().unwrap_or_default();
            match row.field(field) {
                Some(Value::String(s)) => json!(s.len()),
                _ => Value::Null,
            }
        }

        fn compare(&self, desc: &ColumnDesc, a: &DataRow, b: &DataRow) -> Ordering {
            self.raw(desc, a).as_u64().cmp(&self.raw(desc, b).as_u64())
        }
    }

    #[test]
    fn test_extension_defaults() {
        let factory = |_: &ColumnDesc| -> Box<dyn ColumnExtension> { Box::new(Length) };
        let desc = ColumnDesc::for_field("length", "name");
        let mut ext = factory.create(&desc);

        let (a, b) = (json!({"name": "ab"}), json!({"name": "abc"}));
        let (ra, rb) = (DataRow::new(0, &a), DataRow::new(1, &b));
        assert_eq!(ext.compare(&desc, &ra, &rb), Ordering::Less);
        assert_eq!(ext.label(&desc, &ra).as_deref(), Some("2"));
        assert!(!ext.is_missing(&desc, &ra));
        assert!(ext.set_filter(None).is_err());
        assert!(ext.number(&desc, &ra).is_nan());
    }
}
