use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde_json::{Map, Number, Value};
use tracing::{debug, info};

use lu_core::{ColumnDesc, ColumnRegistry};

use crate::builder::{CategoricalDescBuilder, NumberDescBuilder};
use crate::config::{MissingConfig, ProviderConfig};
use crate::local::LocalDataProvider;
use crate::ProviderError;

/// Most distinct values a text column may have to be read as categorical
const MAX_CATEGORIES: usize = 20;

/// Rows of a CSV file together with detected column descriptors
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: Option<PathBuf>,
    headers: Vec<String>,
    rows: Vec<Value>,
    columns: Vec<ColumnDesc>,
}

impl CsvSource {
    /// Load a CSV file off the async runtime
    pub async fn load(path: PathBuf, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || -> Result<Self, ProviderError> {
            let file = std::fs::File::open(&path)?;
            let mut source = Self::from_reader(std::io::BufReader::new(file), &config)?;
            info!(path = %path.display(), rows = source.rows.len(), "csv loaded");
            source.path = Some(path);
            Ok(source)
        })
        .await
        .map_err(|e| ProviderError::Csv(e.to_string()))?
    }

    /// Parse CSV text with a header row
    pub fn from_reader<R: Read>(reader: R, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut records: Vec<Vec<String>> = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            records.push(record.iter().map(str::to_string).collect());
        }

        let kinds: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| match config.column_type(name) {
                Some(kind) => kind.to_string(),
                None => {
                    let samples = &records[..records.len().min(config.sample_size)];
                    Self::detect_column_type(samples, idx, &config.missing).to_string()
                }
            })
            .collect();

        let rows: Vec<Value> = records
            .iter()
            .map(|record| {
                let fields: Map<String, Value> = headers
                    .iter()
                    .zip(&kinds)
                    .enumerate()
                    .map(|(idx, (name, kind))| {
                        let cell = record.get(idx).map(String::as_str).unwrap_or("");
                        (name.clone(), Self::parse_cell(cell, kind, &config.missing))
                    })
                    .collect();
                Value::Object(fields)
            })
            .collect();

        let columns = headers
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| match kind.as_str() {
                "number" | "boxplot" => {
                    let builder = NumberDescBuilder::new(name.as_str());
                    let builder = if kind == "boxplot" {
                        builder.as_box_plot(None)
                    } else {
                        builder
                    };
                    builder.build(&rows)
                }
                "categorical" => CategoricalDescBuilder::new(name.as_str()).build(&rows),
                other => ColumnDesc::for_field(other, name.as_str()),
            })
            .collect::<Vec<_>>();

        let detected: Vec<(&String, &String)> = headers.iter().zip(&kinds).collect();
        debug!(columns = ?detected, "column types detected");
        Ok(Self {
            path: None,
            headers,
            rows,
            columns,
        })
    }

    /// Guess a column type tag from sampled cells
    ///
    /// Missing cells are ignored. A column with no values at all is a string
    /// column.
    fn detect_column_type(
        samples: &[Vec<String>],
        col_idx: usize,
        missing: &MissingConfig,
    ) -> &'static str {
        let mut is_number = true;
        let mut seen = 0;
        let mut distinct: Vec<&str> = Vec::new();

        for row in samples {
            let Some(value) = row.get(col_idx) else {
                continue;
            };
            if missing.is_missing(value) {
                continue;
            }
            seen += 1;
            if is_number && value.trim().parse::<f64>().is_err() {
                is_number = false;
            }
            if distinct.len() <= MAX_CATEGORIES && !distinct.contains(&value.as_str()) {
                distinct.push(value.as_str());
            }
        }

        if seen == 0 {
            "string"
        } else if is_number {
            "number"
        } else if distinct.len() <= MAX_CATEGORIES && distinct.len() < seen {
            "categorical"
        } else {
            "string"
        }
    }

    fn parse_cell(cell: &str, kind: &str, missing: &MissingConfig) -> Value {
        if missing.is_missing(cell) {
            return Value::Null;
        }
        match kind {
            "number" | "boxplot" => cell
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
            _ => Value::String(cell.to_string()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Hand the rows and detected descriptors to an in-memory provider
    pub fn into_provider(
        self,
        config: ProviderConfig,
        registry: ColumnRegistry,
    ) -> LocalDataProvider {
        LocalDataProvider::with_options(self.rows, self.columns, config, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "name,score,team,note\n\
                        ann,3.5,red,first\n\
                        bob,N/A,blue,second\n\
                        cat,7,red,third\n";

    #[test]
    fn test_detects_column_types() {
        let source = CsvSource::from_reader(DATA.as_bytes(), &ProviderConfig::default()).unwrap();
        let kinds: Vec<&str> = source.columns().iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["string", "number", "categorical", "string"]);
        assert_eq!(source.columns()[1].domain, Some([3.5, 7.0]));
        assert_eq!(source.rows()[1]["score"], Value::Null);
        assert_eq!(source.rows()[2]["score"], 7.0);
    }

    #[test]
    fn test_configured_types_win() {
        let mut config = ProviderConfig::default();
        config.column_types.insert("score".to_string(), "string".to_string());
        let source = CsvSource::from_reader(DATA.as_bytes(), &config).unwrap();
        assert_eq!(source.columns()[1].kind, "string");
        assert_eq!(source.rows()[0]["score"], "3.5");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let path = PathBuf::from("/does/not/exist.csv");
        let result = CsvSource::load(path, &ProviderConfig::default()).await;
        assert!(matches!(result, Err(ProviderError::Io(_))));
    }
}
