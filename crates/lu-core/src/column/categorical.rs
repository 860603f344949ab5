//! Categorical leaf column

use std::cmp::Ordering;

use crate::desc::{Category, ColumnDesc};
use crate::filter::CategoricalFilter;
use crate::value::{as_text, DataRow};

/// Column over a fixed category set
#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    categories: Vec<Category>,
    filter: Option<CategoricalFilter>,
}

impl CategoricalColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        Self {
            categories: desc.resolved_categories(),
            filter: None,
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    /// Category of a row; values outside the category set count as missing
    pub fn category(&self, desc: &ColumnDesc, row: &DataRow) -> Option<&Category> {
        let value = self.value(desc, row)?;
        self.categories.iter().find(|c| c.name == value)
    }

    /// Raw category name of a row
    pub fn value(&self, desc: &ColumnDesc, row: &DataRow) -> Option<String> {
        as_text(desc.column.as_deref().and_then(|f| row.field(f)))
    }

    /// Color of the row's category
    pub fn color(&self, desc: &ColumnDesc, row: &DataRow) -> Option<&str> {
        self.category(desc, row).map(|c| c.color.as_str())
    }

    pub fn matches(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.accepts(self.category(desc, row).map(|c| c.name.as_str())),
        }
    }

    /// Orders by position in the category set
    pub fn compare(&self, desc: &ColumnDesc, a: &DataRow, b: &DataRow) -> Ordering {
        let position = |row: &DataRow| {
            self.category(desc, row)
                .and_then(|cat| self.categories.iter().position(|c| c.name == cat.name))
        };
        position(a).cmp(&position(b))
    }

    pub fn filter(&self) -> Option<&CategoricalFilter> {
        self.filter.as_ref()
    }

    /// Store a filter; a filter including every category is dropped
    pub(crate) fn set_filter(&mut self, filter: Option<CategoricalFilter>) -> bool {
        let filter = filter.and_then(|f| f.normalized(&self.category_names()));
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_lookup_and_order() {
        let desc = ColumnDesc::categorical("c", &["low", "mid", "high"]);
        let col = CategoricalColumn::from_desc(&desc);

        let (a, b, c) = (json!({"c": "high"}), json!({"c": "low"}), json!({"c": "other"}));
        let (ra, rb, rc) = (DataRow::new(0, &a), DataRow::new(1, &b), DataRow::new(2, &c));

        assert_eq!(col.category(&desc, &ra).unwrap().name, "high");
        assert!(col.category(&desc, &rc).is_none());
        assert_eq!(col.compare(&desc, &rb, &ra), Ordering::Less);
    }

    #[test]
    fn test_filter() {
        let desc = ColumnDesc::categorical("c", &["a", "b"]);
        let mut col = CategoricalColumn::from_desc(&desc);
        assert!(col.set_filter(Some(CategoricalFilter::only(&["a"]))));
        assert!(!col.set_filter(Some(CategoricalFilter::only(&["a"]))));

        let (a, b) = (json!({"c": "a"}), json!({"c": "b"}));
        assert!(col.matches(&desc, &DataRow::new(0, &a)));
        assert!(!col.matches(&desc, &DataRow::new(1, &b)));

        assert!(col.set_filter(Some(CategoricalFilter::only(&["a", "b"]))));
        assert!(col.filter().is_none());
    }
}
