//! Per-column filter predicates

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Range filter on raw numeric values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFilter {
    /// Inclusive lower bound, unbounded when `None`
    #[serde(default)]
    pub min: Option<f64>,
    /// Inclusive upper bound, unbounded when `None`
    #[serde(default)]
    pub max: Option<f64>,
    /// Drop rows without a value
    #[serde(default)]
    pub filter_missing: bool,
}

impl NumberFilter {
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            filter_missing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.min.is_some_and(f64::is_finite)
            || self.max.is_some_and(f64::is_finite)
            || self.filter_missing
    }

    pub fn accepts(&self, raw: f64) -> bool {
        if raw.is_nan() {
            return !self.filter_missing;
        }
        self.min.map_or(true, |min| min.is_nan() || raw >= min)
            && self.max.map_or(true, |max| max.is_nan() || raw <= max)
    }
}

/// Included-category set plus missing flag
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalFilter {
    /// Categories that pass, all categories when `None`
    #[serde(default)]
    pub filter: Option<Vec<String>>,
    #[serde(default)]
    pub filter_missing: bool,
}

impl CategoricalFilter {
    pub fn only(categories: &[&str]) -> Self {
        Self {
            filter: Some(categories.iter().map(|c| c.to_string()).collect()),
            filter_missing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.filter.is_some() || self.filter_missing
    }

    pub fn accepts(&self, category: Option<&str>) -> bool {
        match category {
            None => !self.filter_missing,
            Some(c) => self
                .filter
                .as_ref()
                .map_or(true, |set| set.iter().any(|s| s == c)),
        }
    }

    /// Drop the category set when it includes every known category
    pub fn normalized(mut self, known: &[String]) -> Option<Self> {
        if let Some(set) = &self.filter {
            if known.iter().all(|k| set.contains(k)) {
                self.filter = None;
            }
        }
        self.is_active().then_some(self)
    }
}

/// Text filter: case-insensitive substring or regular expression
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFilter {
    #[serde(default)]
    pub text: Option<String>,
    /// Interpret `text` as a regular expression
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub filter_missing: bool,
}

impl StringFilter {
    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            regex: false,
            filter_missing: false,
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            text: Some(pattern.into()),
            regex: true,
            filter_missing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty()) || self.filter_missing
    }

    /// Compile the pattern of a regex filter
    pub fn compile(&self) -> Result<Option<Regex>, regex::Error> {
        match (&self.text, self.regex) {
            (Some(text), true) => RegexBuilder::new(text)
                .case_insensitive(true)
                .build()
                .map(Some),
            _ => Ok(None),
        }
    }

    /// `compiled` must be the result of [`StringFilter::compile`]
    pub fn accepts(&self, value: Option<&str>, compiled: Option<&Regex>) -> bool {
        let Some(value) = value else {
            return !self.filter_missing;
        };
        match (&self.text, compiled) {
            (_, Some(re)) => re.is_match(value),
            (Some(text), None) if !text.is_empty() => {
                value.to_lowercase().contains(&text.to_lowercase())
            }
            _ => true,
        }
    }
}

/// Filter of any column kind, as exchanged with filter editors
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnFilter {
    Number(NumberFilter),
    Categorical(CategoricalFilter),
    Text(StringFilter),
    Extension(Value),
}

impl ColumnFilter {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_filter() {
        let f = NumberFilter::range(1.0, 5.0);
        assert!(f.accepts(1.0));
        assert!(f.accepts(5.0));
        assert!(!f.accepts(5.5));
        assert!(f.accepts(f64::NAN));

        let missing = NumberFilter {
            filter_missing: true,
            ..NumberFilter::default()
        };
        assert!(!missing.accepts(f64::NAN));
        assert!(missing.accepts(100.0));
        assert!(!NumberFilter::default().is_active());
    }

    #[test]
    fn test_categorical_filter_normalization() {
        let known = vec!["a".to_string(), "b".to_string()];
        assert_eq!(CategoricalFilter::only(&["a", "b"]).normalized(&known), None);

        let partial = CategoricalFilter::only(&["a"]).normalized(&known).unwrap();
        assert!(partial.accepts(Some("a")));
        assert!(!partial.accepts(Some("b")));
        assert!(partial.accepts(None));
    }

    #[test]
    fn test_string_filter() {
        let f = StringFilter::contains("LIN");
        assert!(f.accepts(Some("Berlin"), None));
        assert!(!f.accepts(Some("Paris"), None));

        let re = StringFilter::pattern("^p.*s$");
        let compiled = re.compile().unwrap();
        assert!(re.accepts(Some("Paris"), compiled.as_ref()));
        assert!(!re.accepts(Some("Berlin"), compiled.as_ref()));

        assert!(StringFilter::pattern("(").compile().is_err());
    }
}
