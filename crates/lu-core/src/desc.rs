//! Column descriptors
//!
//! A descriptor is the declarative, serializable definition a column is
//! created from. Descriptors are supplied by the embedding application and are
//! shared between all columns created from them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::stats::SortMethod;

/// Default categorical palette, assigned in order to categories without a color
pub const CATEGORY_COLORS: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// Declarative definition of a column
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDesc {
    /// Type tag used to look up the column constructor
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub label: String,

    /// Row field holding the column value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// Raw value domain, a `null` bound is inferred from the data
    #[serde(
        default,
        deserialize_with = "deserialize_bounds",
        skip_serializing_if = "Option::is_none"
    )]
    pub domain: Option<[f64; 2]>,

    /// Output range of the linear mapping, defaults to `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,

    /// Non-linear or scripted mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MappingDesc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryDesc>>,

    /// Link pattern, `$1` is replaced by the cell value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    /// Reduction used to compare multi-valued cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortMethod>,

    /// Type-specific fields of extension columns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnDesc {
    /// Create a bare descriptor with the given type tag and label
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            column: None,
            domain: None,
            range: None,
            map: None,
            categories: None,
            link: None,
            color: None,
            width: None,
            sort: None,
            extra: Map::new(),
        }
    }

    /// Create a descriptor reading the given row field
    pub fn for_field(kind: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        let mut desc = Self::new(kind, column.clone());
        desc.column = Some(column);
        desc
    }

    pub fn number(column: impl Into<String>) -> Self {
        Self::for_field("number", column)
    }

    pub fn categorical(column: impl Into<String>, categories: &[&str]) -> Self {
        let mut desc = Self::for_field("categorical", column);
        desc.categories = Some(
            categories
                .iter()
                .map(|c| CategoryDesc::Name(c.to_string()))
                .collect(),
        );
        desc
    }

    pub fn string(column: impl Into<String>) -> Self {
        Self::for_field("string", column)
    }

    pub fn link(column: impl Into<String>, pattern: Option<&str>) -> Self {
        let mut desc = Self::for_field("link", column);
        desc.link = pattern.map(str::to_string);
        desc
    }

    pub fn box_plot(column: impl Into<String>) -> Self {
        Self::for_field("boxplot", column)
    }

    /// Descriptor of the rank column a ranking starts with
    pub fn rank() -> Self {
        Self::new(crate::column::rank::RANK_TYPE, "Rank")
    }

    pub fn stack(label: impl Into<String>) -> Self {
        Self::new("stack", label)
    }

    pub fn composite(label: impl Into<String>) -> Self {
        Self::new("composite", label)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_domain(mut self, lo: f64, hi: f64) -> Self {
        self.domain = Some([lo, hi]);
        self
    }

    pub fn with_map(mut self, map: MappingDesc) -> Self {
        self.map = Some(map);
        self
    }

    /// Normalized category list with labels and colors filled in
    pub fn resolved_categories(&self) -> Vec<Category> {
        self.categories
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let default_color = CATEGORY_COLORS[i % CATEGORY_COLORS.len()];
                match c {
                    CategoryDesc::Name(name) => Category {
                        name: name.clone(),
                        label: name.clone(),
                        color: default_color.to_string(),
                    },
                    CategoryDesc::Full { name, label, color } => Category {
                        name: name.clone(),
                        label: label.clone().unwrap_or_else(|| name.clone()),
                        color: color.clone().unwrap_or_else(|| default_color.to_string()),
                    },
                }
            })
            .collect()
    }
}

/// Mapping definition inside a descriptor or a dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDesc {
    /// One of `linear`, `sqrt`, `pow1.1`, `pow2`, `pow3`, `script`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(
        default,
        deserialize_with = "deserialize_bounds",
        skip_serializing_if = "Option::is_none"
    )]
    pub domain: Option<[f64; 2]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,

    /// Source of a scripted mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A category given either by name or with explicit label and color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryDesc {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
}

/// A resolved category
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub label: String,
    pub color: String,
}

/// Reference to a descriptor inside a dump or a sort description
///
/// Providers backed by a known column set emit the short `Key` form for
/// descriptors they already know and embed everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescRef {
    Key(String),
    Inline(Box<ColumnDesc>),
}

/// `null` bounds become NaN so that domain inference can fill them in
impl PartialEq for ColumnDesc {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.label == other.label
            && self.column == other.column
            && same_bounds(self.domain, other.domain)
            && same_bounds(self.range, other.range)
            && self.map == other.map
            && self.categories == other.categories
            && self.link == other.link
            && self.color == other.color
            && self.width == other.width
            && self.sort == other.sort
            && self.extra == other.extra
    }
}

impl PartialEq for MappingDesc {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && same_bounds(self.domain, other.domain)
            && same_bounds(self.range, other.range)
            && self.code == other.code
    }
}

/// Bounds equality where an unknown (NaN) bound equals another unknown bound
pub(crate) fn same_bounds(a: Option<[f64; 2]>, b: Option<[f64; 2]>) -> bool {
    let same = |x: f64, y: f64| x == y || (x.is_nan() && y.is_nan());
    match (a, b) {
        (Some(a), Some(b)) => same(a[0], b[0]) && same(a[1], b[1]),
        (None, None) => true,
        _ => false,
    }
}

fn deserialize_bounds<'de, D>(deserializer: D) -> Result<Option<[f64; 2]>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<[Option<f64>; 2]> = Option::deserialize(deserializer)?;
    Ok(raw.map(|[lo, hi]| [lo.unwrap_or(f64::NAN), hi.unwrap_or(f64::NAN)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_from_json() {
        let desc: ColumnDesc = serde_json::from_value(json!({
            "type": "number",
            "label": "Score",
            "column": "score",
            "domain": [0, null],
            "stepSize": 2
        }))
        .unwrap();

        assert_eq!(desc.kind, "number");
        let domain = desc.domain.unwrap();
        assert_eq!(domain[0], 0.0);
        assert!(domain[1].is_nan());
        assert_eq!(desc.extra.get("stepSize"), Some(&json!(2)));
    }

    #[test]
    fn test_categories_resolve_defaults() {
        let desc: ColumnDesc = serde_json::from_value(json!({
            "type": "categorical",
            "column": "c",
            "categories": ["a", {"name": "b", "label": "Bee", "color": "red"}]
        }))
        .unwrap();

        let cats = desc.resolved_categories();
        assert_eq!(cats[0].label, "a");
        assert_eq!(cats[0].color, CATEGORY_COLORS[0]);
        assert_eq!(cats[1].label, "Bee");
        assert_eq!(cats[1].color, "red");
    }

    #[test]
    fn test_desc_ref_forms() {
        let key: DescRef = serde_json::from_value(json!("score")).unwrap();
        assert_eq!(key, DescRef::Key("score".to_string()));

        let inline: DescRef = serde_json::from_value(json!({"type": "string", "label": "x"})).unwrap();
        assert!(matches!(inline, DescRef::Inline(_)));
    }
}
