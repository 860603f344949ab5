//! Text and link columns

use regex::Regex;
use serde_json::Value;

use crate::desc::ColumnDesc;
use crate::filter::StringFilter;
use crate::value::{as_text, DataRow};

/// Plain text column
#[derive(Debug, Clone, Default)]
pub struct StringColumn {
    filter: Option<StringFilter>,
    compiled: Option<Regex>,
}

impl StringColumn {
    pub fn from_desc(_desc: &ColumnDesc) -> Self {
        Self::default()
    }

    pub fn value(&self, desc: &ColumnDesc, row: &DataRow) -> Option<String> {
        as_text(desc.column.as_deref().and_then(|f| row.field(f)))
    }

    pub fn matches(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        self.accepts(self.value(desc, row).as_deref())
    }

    fn accepts(&self, value: Option<&str>) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.accepts(value, self.compiled.as_ref()),
        }
    }

    pub fn filter(&self) -> Option<&StringFilter> {
        self.filter.as_ref()
    }

    /// Store a filter, compiling regex patterns up front
    pub(crate) fn set_filter(&mut self, filter: Option<StringFilter>) -> Result<bool, regex::Error> {
        let filter = filter.filter(StringFilter::is_active);
        if self.filter == filter {
            return Ok(false);
        }
        self.compiled = match &filter {
            Some(f) => f.compile()?,
            None => None,
        };
        self.filter = filter;
        Ok(true)
    }
}

/// Text column whose value is a link
///
/// Cells are either plain text, rewritten through the link pattern, or
/// objects of the form `{"href": ..., "alt": ...}`.
#[derive(Debug, Clone, Default)]
pub struct LinkColumn {
    text: StringColumn,
    link: Option<String>,
}

impl LinkColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        Self {
            text: StringColumn::from_desc(desc),
            link: desc.link.clone(),
        }
    }

    fn cell<'a>(desc: &ColumnDesc, row: &DataRow<'a>) -> Option<&'a Value> {
        desc.column.as_deref().and_then(|f| row.field(f))
    }

    /// Display text: the `alt` of a link object or the plain value
    pub fn label(&self, desc: &ColumnDesc, row: &DataRow) -> Option<String> {
        match Self::cell(desc, row) {
            Some(cell @ Value::Object(_)) => {
                as_text(cell.get("alt")).or_else(|| as_text(cell.get("href")))
            }
            other => as_text(other),
        }
    }

    /// Link target: the `href` of a link object or the value through the pattern
    pub fn value(&self, desc: &ColumnDesc, row: &DataRow) -> Option<String> {
        match Self::cell(desc, row) {
            Some(cell @ Value::Object(_)) => as_text(cell.get("href")),
            other => {
                let text = as_text(other);
                match &self.link {
                    Some(pattern) => Some(pattern.replace("$1", text.as_deref().unwrap_or(""))),
                    None => text,
                }
            }
        }
    }

    pub fn is_link(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        if self.link.is_some() {
            return true;
        }
        matches!(Self::cell(desc, row), Some(cell @ Value::Object(_)) if cell.get("href").is_some())
    }

    pub fn matches(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        self.text.accepts(self.label(desc, row).as_deref())
    }

    /// Current pattern, empty when none is set
    pub fn link(&self) -> &str {
        self.link.as_deref().unwrap_or("")
    }

    pub(crate) fn link_pattern(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub(crate) fn set_link(&mut self, link: Option<String>) -> bool {
        if self.link == link {
            return false;
        }
        self.link = link;
        true
    }

    pub fn filter(&self) -> Option<&StringFilter> {
        self.text.filter()
    }

    pub(crate) fn set_filter(&mut self, filter: Option<StringFilter>) -> Result<bool, regex::Error> {
        self.text.set_filter(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_pattern() {
        let desc = ColumnDesc::link("name", Some("https://example.org/$1"));
        let col = LinkColumn::from_desc(&desc);

        let row = json!({"name": "abc"});
        let r = DataRow::new(0, &row);
        assert_eq!(col.value(&desc, &r).as_deref(), Some("https://example.org/abc"));
        assert_eq!(col.label(&desc, &r).as_deref(), Some("abc"));
        assert!(col.is_link(&desc, &r));
    }

    #[test]
    fn test_link_objects() {
        let desc = ColumnDesc::link("site", None);
        let col = LinkColumn::from_desc(&desc);

        let row = json!({"site": {"href": "https://a.example", "alt": "A"}});
        let r = DataRow::new(0, &row);
        assert_eq!(col.value(&desc, &r).as_deref(), Some("https://a.example"));
        assert_eq!(col.label(&desc, &r).as_deref(), Some("A"));
        assert!(col.is_link(&desc, &r));

        let plain = json!({"site": "text"});
        assert!(!col.is_link(&desc, &DataRow::new(1, &plain)));
    }

    #[test]
    fn test_string_filter_compiles() {
        let desc = ColumnDesc::string("s");
        let mut col = StringColumn::from_desc(&desc);
        assert!(col.set_filter(Some(StringFilter::pattern("^a"))).unwrap());
        assert!(col.set_filter(Some(StringFilter::pattern("["))).is_err());

        let (a, b) = (json!({"s": "apple"}), json!({"s": "banana"}));
        assert!(col.matches(&desc, &DataRow::new(0, &a)));
        assert!(!col.matches(&desc, &DataRow::new(1, &b)));

        assert!(col.set_filter(Some(StringFilter::contains(""))).unwrap());
        assert!(col.filter().is_none());
    }
}
