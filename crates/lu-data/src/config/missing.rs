//! Missing value handling for text cells

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text patterns that mark a cell as missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MissingConfig {
    /// Patterns to treat as missing
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for MissingConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "-".to_string(),
                "N/A".to_string(),
                "NA".to_string(),
                "NaN".to_string(),
                "null".to_string(),
                "None".to_string(),
            ],
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl MissingConfig {
    /// Check if a text cell counts as missing
    pub fn is_missing(&self, value: &str) -> bool {
        let test_value = if self.trim_whitespace {
            value.trim()
        } else {
            value
        };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// Replace missing text cells of the given fields by `null`, in place
    ///
    /// Returns the number of replaced cells.
    pub fn normalize_row(&self, row: &mut Value, fields: &[&str]) -> usize {
        let Value::Object(cells) = row else {
            return 0;
        };
        let mut replaced = 0;
        for field in fields {
            if let Some(value) = cells.get_mut(*field) {
                if matches!(value, Value::String(s) if self.is_missing(s)) {
                    *value = Value::Null;
                    replaced += 1;
                }
            }
        }
        replaced
    }

    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn remove_pattern(&mut self, pattern: &str) {
        self.patterns.retain(|p| p != pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_patterns() {
        let config = MissingConfig::default();
        assert!(config.is_missing(""));
        assert!(config.is_missing("  n/a "));
        assert!(config.is_missing("NULL"));
        assert!(!config.is_missing("0"));
    }

    #[test]
    fn test_case_sensitive() {
        let mut config = MissingConfig {
            case_sensitive: true,
            ..MissingConfig::default()
        };
        assert!(!config.is_missing("NULL"));
        config.add_pattern("NULL".to_string());
        assert!(config.is_missing("NULL"));
        config.remove_pattern("NULL");
        assert!(!config.is_missing("NULL"));
    }

    #[test]
    fn test_normalize_row() {
        let config = MissingConfig::default();
        let mut row = json!({"a": "N/A", "b": "text", "c": 3, "d": "None"});
        assert_eq!(config.normalize_row(&mut row, &["a", "b", "c", "x"]), 1);
        assert_eq!(row, json!({"a": null, "b": "text", "c": 3, "d": "None"}));
    }
}
