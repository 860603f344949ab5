//! Provider configuration

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::missing::MissingConfig;
use crate::ProviderError;

/// Number of rows sampled for column type detection by default
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// Settings shared by the providers and the CSV loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Row field holding a stable row key; rows are keyed by position when unset
    pub identity: Option<String>,

    /// Width of new columns whose descriptor has none
    pub default_width: Option<f32>,

    /// Missing value handling for text cells
    pub missing: MissingConfig,

    /// Rows sampled for type detection when loading files
    pub sample_size: usize,

    /// Column type tag overrides, by field name
    pub column_types: HashMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            identity: None,
            default_width: None,
            missing: MissingConfig::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            column_types: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_identity(mut self, field: impl Into<String>) -> Self {
        self.identity = Some(field.into());
        self
    }

    /// Type tag override for a field
    pub fn column_type(&self, field: &str) -> Option<&str> {
        self.column_types.get(field).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let config = ProviderConfig::from_json(
            r#"{"identity": "id", "columnTypes": {"zip": "string"}, "missing": {"patterns": ["?"]}}"#,
        )
        .unwrap();
        assert_eq!(config.identity.as_deref(), Some("id"));
        assert_eq!(config.column_type("zip"), Some("string"));
        assert_eq!(config.sample_size, DEFAULT_SAMPLE_SIZE);
        assert!(config.missing.is_missing("?"));
        assert!(!config.missing.is_missing("N/A"));
        assert!(config.missing.trim_whitespace);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ProviderConfig::from_json("{"),
            Err(ProviderError::Serialization(_))
        ));
    }
}
