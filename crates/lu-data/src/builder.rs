//! Fluent builders for column descriptors
//!
//! `build(rows)` finalizes a descriptor against the data it will be used
//! with, inferring whatever the caller left open.

use serde_json::{json, Value};

use lu_core::mapping::resolve_domain;
use lu_core::value::as_text;
use lu_core::{CategoryDesc, ColumnDesc, MappingDesc, ScaleKind, SortMethod};

/// Builder for `number` and `boxplot` descriptors
#[derive(Debug, Clone)]
pub struct NumberDescBuilder {
    desc: ColumnDesc,
}

impl NumberDescBuilder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            desc: ColumnDesc::number(column),
        }
    }

    /// Builder with a linear mapping over a known domain
    pub fn with_domain(column: impl Into<String>, domain: [f64; 2]) -> Self {
        Self::new(column).mapping(ScaleKind::Linear, domain, None)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.desc.label = label.into();
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.desc.width = Some(width);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.desc.color = Some(color.into());
        self
    }

    /// Normalize with the given law; NaN bounds are inferred on `build`
    ///
    /// A linear law is stored as the descriptor's own domain and range, the
    /// others as a separate mapping with a default `[0, 1]` range.
    pub fn mapping(mut self, kind: ScaleKind, domain: [f64; 2], range: Option<[f64; 2]>) -> Self {
        if kind == ScaleKind::Linear {
            self.desc.domain = Some(domain);
            if range.is_some() {
                self.desc.range = range;
            }
            self.desc.map = None;
        } else {
            self.desc.map = Some(MappingDesc {
                kind: kind.tag().to_string(),
                domain: Some(domain),
                range: Some(range.unwrap_or([0.0, 1.0])),
                code: None,
            });
        }
        self
    }

    /// Normalize with a registered script
    pub fn scripted(mut self, code: impl Into<String>, domain: [f64; 2]) -> Self {
        self.desc.map = Some(MappingDesc {
            kind: "script".to_string(),
            domain: Some(domain),
            range: None,
            code: Some(code.into()),
        });
        self
    }

    /// Cells hold arrays, optionally labelled, compared through `sort`
    pub fn as_array(mut self, labels: &[&str], sort: Option<SortMethod>) -> Self {
        if !labels.is_empty() {
            self.desc.extra.insert("labels".to_string(), json!(labels));
            self.desc
                .extra
                .insert("dataLength".to_string(), json!(labels.len()));
        }
        if sort.is_some() {
            self.desc.sort = sort;
        }
        self
    }

    /// Turn the column into a box plot column
    pub fn as_box_plot(mut self, sort: Option<SortMethod>) -> Self {
        if sort.is_some() {
            self.desc.sort = sort;
        }
        self.desc.kind = "boxplot".to_string();
        self
    }

    /// Finalize, inferring a missing or partial domain from `rows`
    pub fn build(mut self, rows: &[Value]) -> ColumnDesc {
        resolve_domain(&mut self.desc, rows);
        self.desc
    }
}

/// Builder for `categorical` descriptors
#[derive(Debug, Clone)]
pub struct CategoricalDescBuilder {
    desc: ColumnDesc,
}

impl CategoricalDescBuilder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            desc: ColumnDesc::for_field("categorical", column),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.desc.label = label.into();
        self
    }

    pub fn categories(mut self, names: &[&str]) -> Self {
        self.desc.categories = Some(
            names
                .iter()
                .map(|name| CategoryDesc::Name(name.to_string()))
                .collect(),
        );
        self
    }

    /// Add a category with an explicit label and color
    pub fn category(mut self, name: &str, label: Option<&str>, color: Option<&str>) -> Self {
        self.desc
            .categories
            .get_or_insert_with(Vec::new)
            .push(CategoryDesc::Full {
                name: name.to_string(),
                label: label.map(str::to_string),
                color: color.map(str::to_string),
            });
        self
    }

    /// Finalize; without declared categories they are collected from `rows`
    /// in sorted order
    pub fn build(mut self, rows: &[Value]) -> ColumnDesc {
        if self.desc.categories.is_none() {
            let column = self.desc.column.clone().unwrap_or_default();
            let mut names: Vec<String> = rows.iter().filter_map(|row| as_text(row.get(&column))).collect();
            names.sort();
            names.dedup();
            self.desc.categories = Some(names.into_iter().map(CategoryDesc::Name).collect());
        }
        self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_inferred() {
        let rows = vec![json!({"v": 1}), json!({"v": 5}), json!({"v": "x"}), json!({"v": null})];
        let desc = NumberDescBuilder::new("v").build(&rows);
        assert_eq!(desc.domain, Some([1.0, 5.0]));
        assert!(desc.map.is_none());
    }

    #[test]
    fn test_partial_domain_and_arrays() {
        let rows = vec![json!({"v": [2, 8, 3]}), json!({"v": [-1]})];
        let desc = NumberDescBuilder::new("v")
            .mapping(ScaleKind::Sqrt, [0.0, f64::NAN], None)
            .as_array(&["a", "b", "c"], Some(SortMethod::Median))
            .build(&rows);
        let map = desc.map.unwrap();
        assert_eq!(map.kind, "sqrt");
        assert_eq!(map.domain, Some([0.0, 8.0]));
        assert_eq!(map.range, Some([0.0, 1.0]));
        assert_eq!(desc.sort, Some(SortMethod::Median));
        assert_eq!(desc.extra["dataLength"], 3);
    }

    #[test]
    fn test_empty_data_gives_infinite_bounds() {
        let desc = NumberDescBuilder::new("v").as_box_plot(None).build(&[]);
        assert_eq!(desc.kind, "boxplot");
        assert_eq!(desc.domain, Some([f64::INFINITY, f64::NEG_INFINITY]));
    }

    #[test]
    fn test_declared_domain_kept() {
        let rows = vec![json!({"v": 100})];
        let desc = NumberDescBuilder::with_domain("v", [0.0, 10.0])
            .label("Value")
            .build(&rows);
        assert_eq!(desc.domain, Some([0.0, 10.0]));
        assert_eq!(desc.label, "Value");

        let scripted = NumberDescBuilder::new("v").scripted("log", [1.0, 2.0]).build(&rows);
        assert_eq!(scripted.map.unwrap().code.as_deref(), Some("log"));
    }

    #[test]
    fn test_categories_from_data() {
        let rows = vec![json!({"c": "b"}), json!({"c": "a"}), json!({"c": null}), json!({"c": "b"})];
        let desc = CategoricalDescBuilder::new("c").build(&rows);
        let names: Vec<String> = desc.resolved_categories().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        let declared = CategoricalDescBuilder::new("c")
            .category("z", Some("Zed"), None)
            .build(&rows);
        assert_eq!(declared.resolved_categories()[0].label, "Zed");
    }
}
