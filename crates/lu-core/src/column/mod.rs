//! Column type model
//!
//! Built-in column kinds form a closed set of variants; anything else plugs in
//! through [`extension::ColumnExtension`]. Attached columns live in the arena
//! of their ranking and refer to their composite parent by id. Detached
//! columns travel as a [`ColumnTree`].

pub mod categorical;
pub mod composite;
pub mod extension;
pub mod number;
pub mod rank;
pub mod string;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::desc::ColumnDesc;
use crate::filter::{ColumnFilter, StringFilter};
use crate::mapping::MappingFunction;
use crate::stats::SortMethod;
use crate::value::DataRow;
use crate::ModelError;

pub use categorical::CategoricalColumn;
pub use composite::{CompositeColumn, StackColumn};
pub use extension::{ColumnExtension, ColumnExtensionFactory};
pub use number::{BoxPlotColumn, NumberColumn};
pub use rank::{RankColumn, RankSource};
pub use string::{LinkColumn, StringColumn};

/// Default column width in pixels
pub const DEFAULT_WIDTH: f32 = 100.0;

/// Default header color
pub const DEFAULT_COLOR: &str = "#C1C1C1";

/// Provider-scoped unique column identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The `n`-th id minted by a provider
    pub fn nth(n: usize) -> Self {
        Self(format!("col{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The variant-specific part of a column
#[derive(Debug)]
pub enum ColumnKind {
    Number(NumberColumn),
    BoxPlot(BoxPlotColumn),
    Categorical(CategoricalColumn),
    String(StringColumn),
    Link(LinkColumn),
    Rank(RankColumn),
    Stack(StackColumn),
    Composite(CompositeColumn),
    Extension(Box<dyn ColumnExtension>),
}

impl ColumnKind {
    /// Ordered child ids of composite kinds, empty for leaves
    pub fn children(&self) -> &[ColumnId] {
        match self {
            ColumnKind::Stack(stack) => &stack.children,
            ColumnKind::Composite(composite) => &composite.children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<ColumnId>> {
        match self {
            ColumnKind::Stack(stack) => Some(&mut stack.children),
            ColumnKind::Composite(composite) => Some(&mut composite.children),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, ColumnKind::Stack(_) | ColumnKind::Composite(_))
    }

    /// Whether the column produces a normalized number per row
    pub fn is_numeric(&self) -> bool {
        match self {
            ColumnKind::Number(_) | ColumnKind::BoxPlot(_) | ColumnKind::Stack(_) => true,
            ColumnKind::Extension(ext) => ext.is_numeric(),
            _ => false,
        }
    }
}

/// A column instance
#[derive(Debug)]
pub struct Column {
    id: ColumnId,
    desc: Arc<ColumnDesc>,
    label: String,
    width: f32,
    visible: bool,
    color: Option<String>,
    parent: Option<ColumnId>,
    pub(crate) kind: ColumnKind,
}

impl Column {
    pub fn new(id: ColumnId, desc: Arc<ColumnDesc>, kind: ColumnKind, default_width: f32) -> Self {
        Self {
            label: desc.label.clone(),
            width: desc.width.unwrap_or(default_width),
            color: desc.color.clone(),
            visible: true,
            parent: None,
            id,
            desc,
            kind,
        }
    }

    pub fn id(&self) -> &ColumnId {
        &self.id
    }

    pub fn desc(&self) -> &Arc<ColumnDesc> {
        &self.desc
    }

    /// Data-type tag of the descriptor this column was created from
    pub fn type_tag(&self) -> &str {
        &self.desc.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Owning composite, `None` for top-level columns of a ranking
    pub fn parent(&self) -> Option<&ColumnId> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn children(&self) -> &[ColumnId] {
        self.kind.children()
    }

    pub fn is_composite(&self) -> bool {
        self.kind.is_composite()
    }

    /// The raw cell of this column, `Null` for composites and absent fields
    pub fn raw(&self, row: &DataRow) -> Value {
        match &self.kind {
            ColumnKind::Extension(ext) => ext.raw(&self.desc, row),
            ColumnKind::Rank(c) => c.rank(row).map_or(Value::Null, |rank| Value::from(rank + 1)),
            _ => self
                .desc
                .column
                .as_deref()
                .and_then(|field| row.field(field))
                .cloned()
                .unwrap_or(Value::Null),
        }
    }

    /// Whether the current filter of this column is restrictive
    pub fn is_filtered(&self) -> bool {
        match &self.kind {
            ColumnKind::Number(c) => c.filter().is_active(),
            ColumnKind::BoxPlot(c) => c.filter().is_active(),
            ColumnKind::Categorical(c) => c.filter().is_some(),
            ColumnKind::String(c) => c.filter().is_some(),
            ColumnKind::Link(c) => c.filter().is_some(),
            ColumnKind::Extension(ext) => ext.is_filtered(),
            ColumnKind::Rank(_) | ColumnKind::Stack(_) | ColumnKind::Composite(_) => false,
        }
    }

    /// Filter of this column for filter editors
    pub fn filter(&self) -> Option<ColumnFilter> {
        match &self.kind {
            ColumnKind::Number(c) => Some(ColumnFilter::Number(c.filter().clone())),
            ColumnKind::BoxPlot(c) => Some(ColumnFilter::Number(c.filter().clone())),
            ColumnKind::Categorical(c) => c.filter().cloned().map(ColumnFilter::Categorical),
            ColumnKind::String(c) => c.filter().cloned().map(ColumnFilter::Text),
            ColumnKind::Link(c) => c.filter().cloned().map(ColumnFilter::Text),
            ColumnKind::Extension(ext) => ext.filter().map(ColumnFilter::Extension),
            ColumnKind::Rank(_) | ColumnKind::Stack(_) | ColumnKind::Composite(_) => None,
        }
    }

    /// Parse a serialized filter into the form this column accepts
    pub fn parse_filter(&self, value: Value) -> Result<ColumnFilter, ModelError> {
        let invalid = |e: serde_json::Error| ModelError::InvalidFilter {
            column: self.id.clone(),
            reason: e.to_string(),
        };
        match &self.kind {
            ColumnKind::Number(_) | ColumnKind::BoxPlot(_) => {
                serde_json::from_value(value).map(ColumnFilter::Number).map_err(invalid)
            }
            ColumnKind::Categorical(_) => serde_json::from_value(value)
                .map(ColumnFilter::Categorical)
                .map_err(invalid),
            ColumnKind::String(_) | ColumnKind::Link(_) => {
                serde_json::from_value(value).map(ColumnFilter::Text).map_err(invalid)
            }
            ColumnKind::Extension(_) => Ok(ColumnFilter::Extension(value)),
            ColumnKind::Rank(_) | ColumnKind::Stack(_) | ColumnKind::Composite(_) => Err(ModelError::Unsupported {
                column: self.id.clone(),
                operation: "filter",
            }),
        }
    }

    /// Replace the filter, `None` clears it; returns whether it changed
    pub(crate) fn set_filter(&mut self, filter: Option<ColumnFilter>) -> Result<bool, ModelError> {
        let id = self.id.clone();
        let mismatch = || ModelError::InvalidFilter {
            column: id.clone(),
            reason: "filter does not fit the column type".to_string(),
        };
        match (&mut self.kind, filter) {
            (ColumnKind::Number(c), None) => Ok(c.set_filter(Default::default())),
            (ColumnKind::Number(c), Some(ColumnFilter::Number(f))) => Ok(c.set_filter(f)),
            (ColumnKind::BoxPlot(c), None) => Ok(c.set_filter(Default::default())),
            (ColumnKind::BoxPlot(c), Some(ColumnFilter::Number(f))) => Ok(c.set_filter(f)),
            (ColumnKind::Categorical(c), None) => Ok(c.set_filter(None)),
            (ColumnKind::Categorical(c), Some(ColumnFilter::Categorical(f))) => {
                Ok(c.set_filter(Some(f)))
            }
            (ColumnKind::String(c), f @ (None | Some(ColumnFilter::Text(_)))) => c
                .set_filter(text_filter(f))
                .map_err(|e| ModelError::InvalidFilter {
                    column: id.clone(),
                    reason: e.to_string(),
                }),
            (ColumnKind::Link(c), f @ (None | Some(ColumnFilter::Text(_)))) => c
                .set_filter(text_filter(f))
                .map_err(|e| ModelError::InvalidFilter {
                    column: id.clone(),
                    reason: e.to_string(),
                }),
            (ColumnKind::Extension(ext), f @ (None | Some(ColumnFilter::Extension(_)))) => {
                let value = match f {
                    Some(ColumnFilter::Extension(v)) => Some(v),
                    _ => None,
                };
                ext.set_filter(value).map_err(|reason| ModelError::InvalidFilter {
                    column: id.clone(),
                    reason,
                })
            }
            (ColumnKind::Rank(_) | ColumnKind::Stack(_) | ColumnKind::Composite(_), _) => Err(ModelError::Unsupported {
                column: id.clone(),
                operation: "filter",
            }),
            _ => Err(mismatch()),
        }
    }

    /// Current normalization of numeric columns
    pub fn mapping(&self) -> Option<&MappingFunction> {
        match &self.kind {
            ColumnKind::Number(c) => Some(c.mapping()),
            ColumnKind::BoxPlot(c) => Some(c.mapping()),
            _ => None,
        }
    }

    /// Normalization declared by the descriptor
    pub fn original_mapping(&self) -> Option<&MappingFunction> {
        match &self.kind {
            ColumnKind::Number(c) => Some(c.original_mapping()),
            ColumnKind::BoxPlot(c) => Some(c.original_mapping()),
            _ => None,
        }
    }

    pub(crate) fn set_mapping(&mut self, mapping: MappingFunction) -> Result<bool, ModelError> {
        match &mut self.kind {
            ColumnKind::Number(c) => Ok(c.set_mapping(mapping)),
            ColumnKind::BoxPlot(c) => Ok(c.set_mapping(mapping)),
            _ => Err(ModelError::Unsupported {
                column: self.id.clone(),
                operation: "mapping",
            }),
        }
    }

    /// Reduction of multi-valued cells for numeric columns
    pub fn sort_method(&self) -> Option<SortMethod> {
        match &self.kind {
            ColumnKind::Number(c) => Some(c.sort_method()),
            ColumnKind::BoxPlot(c) => Some(c.sort_method()),
            _ => None,
        }
    }

    pub(crate) fn set_sort_method(&mut self, method: SortMethod) -> Result<bool, ModelError> {
        let changed = self.sort_method() != Some(method);
        match &mut self.kind {
            ColumnKind::Number(c) => c.set_sort_method(method),
            ColumnKind::BoxPlot(c) => c.set_sort_method(method),
            _ => {
                return Err(ModelError::Unsupported {
                    column: self.id.clone(),
                    operation: "sort method",
                })
            }
        }
        Ok(changed)
    }

    /// Whether a leaf row passes this column's own filter
    pub(crate) fn matches_leaf(&self, row: &DataRow) -> bool {
        let desc = &self.desc;
        match &self.kind {
            ColumnKind::Number(c) => c.matches(desc, row),
            ColumnKind::BoxPlot(c) => c.matches(desc, row),
            ColumnKind::Categorical(c) => c.matches(desc, row),
            ColumnKind::String(c) => c.matches(desc, row),
            ColumnKind::Link(c) => c.matches(desc, row),
            ColumnKind::Extension(ext) => ext.matches(desc, row),
            ColumnKind::Rank(_) | ColumnKind::Stack(_) | ColumnKind::Composite(_) => true,
        }
    }

    /// Missing check for leaves; composites are never missing
    pub(crate) fn is_missing_leaf(&self, row: &DataRow) -> bool {
        let desc = &self.desc;
        match &self.kind {
            ColumnKind::Number(c) => c.raw_number(desc, row).is_nan(),
            ColumnKind::BoxPlot(c) => c.raw_number(desc, row).is_nan(),
            ColumnKind::Categorical(c) => c.category(desc, row).is_none(),
            ColumnKind::String(c) => c.value(desc, row).is_none(),
            ColumnKind::Link(c) => c.label(desc, row).is_none(),
            ColumnKind::Extension(ext) => ext.is_missing(desc, row),
            ColumnKind::Rank(c) => c.rank(row).is_none(),
            ColumnKind::Stack(_) | ColumnKind::Composite(_) => false,
        }
    }

    /// Normalized number of a leaf, NaN when missing or not numeric
    pub(crate) fn number_leaf(&self, row: &DataRow) -> f64 {
        let desc = &self.desc;
        match &self.kind {
            ColumnKind::Number(c) => c.number(desc, row),
            ColumnKind::BoxPlot(c) => c.number(desc, row),
            ColumnKind::Extension(ext) => ext.number(desc, row),
            _ => f64::NAN,
        }
    }

    /// Ascending comparison of two non-missing leaf values
    pub(crate) fn compare_leaf(&self, a: &DataRow, b: &DataRow) -> Ordering {
        let desc = &self.desc;
        match &self.kind {
            ColumnKind::Number(c) => c.number(desc, a).total_cmp(&c.number(desc, b)),
            ColumnKind::BoxPlot(c) => c.number(desc, a).total_cmp(&c.number(desc, b)),
            ColumnKind::Categorical(c) => c.compare(desc, a, b),
            ColumnKind::String(c) => c.value(desc, a).cmp(&c.value(desc, b)),
            ColumnKind::Link(c) => c.value(desc, a).cmp(&c.value(desc, b)),
            ColumnKind::Extension(ext) => ext.compare(desc, a, b),
            ColumnKind::Rank(c) => c.compare(a, b),
            ColumnKind::Stack(_) | ColumnKind::Composite(_) => Ordering::Equal,
        }
    }

    /// Display label of a leaf cell
    pub(crate) fn label_leaf(&self, row: &DataRow) -> Option<String> {
        let desc = &self.desc;
        match &self.kind {
            ColumnKind::Number(c) => {
                let v = c.raw_number(desc, row);
                (!v.is_nan()).then(|| crate::stats::format_number(v))
            }
            ColumnKind::BoxPlot(c) => c.raw_box_plot(desc, row).map(|b| b.label()),
            ColumnKind::Categorical(c) => c.category(desc, row).map(|cat| cat.label.clone()),
            ColumnKind::String(c) => c.value(desc, row),
            ColumnKind::Link(c) => c.label(desc, row),
            ColumnKind::Extension(ext) => ext.label(desc, row),
            ColumnKind::Rank(c) => c.label(row),
            ColumnKind::Stack(_) | ColumnKind::Composite(_) => None,
        }
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    pub(crate) fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_color(&mut self, color: Option<String>) {
        self.color = color;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ColumnId>) {
        self.parent = parent;
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ColumnKind {
        &mut self.kind
    }
}

fn text_filter(filter: Option<ColumnFilter>) -> Option<StringFilter> {
    match filter {
        Some(ColumnFilter::Text(f)) => Some(f),
        _ => None,
    }
}

/// A detached column together with its descendants
#[derive(Debug)]
pub struct ColumnTree {
    pub column: Column,
    pub children: Vec<ColumnTree>,
}

impl ColumnTree {
    pub fn leaf(column: Column) -> Self {
        Self {
            column,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &ColumnId {
        self.column.id()
    }

    /// Depth-first ids of this tree
    pub fn ids(&self) -> Vec<ColumnId> {
        let mut ids = vec![self.column.id().clone()];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Per-row cell contract for renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellValue {
    pub raw_value: Value,
    /// Value in `[0, 1]` for numeric columns
    pub normalized_value: Option<f64>,
    pub is_missing: bool,
    /// Display text
    pub label: Option<String>,
}

/// Column geometry for header layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnLayout {
    pub id: ColumnId,
    pub label: String,
    pub width: f32,
    pub color: Option<String>,
    /// Nesting depth below the ranking root
    pub depth: usize,
}
