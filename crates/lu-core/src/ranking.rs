//! The ranking root
//!
//! A [`Ranking`] owns the arena of every column in its tree, the sort
//! criteria and the most recent order. Columns refer to their composite
//! parent by id; top-level columns have no parent. All mutations go through
//! the ranking so that change events fire in one place.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::rank::RANK_WIDTH;
use crate::column::{
    CellValue, Column, ColumnId, ColumnKind, ColumnLayout, ColumnTree, RankColumn, RankSource,
};
use crate::desc::{ColumnDesc, DescRef};
use crate::dump::{ColumnDump, RankingDump, SortCriterionDump};
use crate::events::{ColumnEvent, Emitter, EventKind};
use crate::filter::ColumnFilter;
use crate::mapping::MappingFunction;
use crate::registry::ColumnRegistry;
use crate::sorting::{FilterTerm, SortColumn, SortDescription, SortTerm, WeightedSortColumn};
use crate::stats::{format_number, LazyBoxPlot, SortMethod};
use crate::value::DataRow;
use crate::ModelError;

/// Group key of rows without a category
pub const MISSING_GROUP: &str = "Missing values";

/// Provider-scoped ranking identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankingId(String);

impl RankingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The `n`-th ranking id of a provider
    pub fn nth(n: usize) -> Self {
        Self(format!("rank{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sequence number of ids in the `rank{n}` form
    pub fn sequence(&self) -> Option<usize> {
        self.0.strip_prefix("rank")?.parse().ok()
    }
}

impl fmt::Display for RankingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sort key of a ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCriterion {
    pub column: ColumnId,
    pub asc: bool,
}

impl SortCriterion {
    pub fn new(column: ColumnId, asc: bool) -> Self {
        Self { column, asc }
    }
}

/// Sort lifecycle of a ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortState {
    #[default]
    Unsorted,
    Sorting,
    Sorted,
}

/// Root of one ranking
pub struct Ranking {
    id: RankingId,
    /// Id of the rank column, which top-level columns report as their parent
    root: ColumnId,
    /// Rank column shown before the top-level columns; never removed
    rank: Column,
    columns: IndexMap<ColumnId, Column>,
    roots: Vec<ColumnId>,
    sort_criteria: Vec<SortCriterion>,
    order: Vec<usize>,
    state: SortState,
    /// State outside of any pending sort, restored when a sort fails
    settled: SortState,
    events: Emitter<ColumnEvent>,
}

impl Ranking {
    pub fn new(id: RankingId) -> Self {
        let root = ColumnId::new(id.as_str());
        let rank = Column::new(
            root.clone(),
            Arc::new(ColumnDesc::rank()),
            ColumnKind::Rank(RankColumn::new()),
            RANK_WIDTH,
        );
        Self {
            root,
            rank,
            id,
            columns: IndexMap::new(),
            roots: Vec::new(),
            sort_criteria: Vec::new(),
            order: Vec::new(),
            state: SortState::Unsorted,
            settled: SortState::Unsorted,
            events: Emitter::new(),
        }
    }

    pub fn id(&self) -> &RankingId {
        &self.id
    }

    /// Id of the rank column, also used for the ranking itself in column events
    pub fn root_id(&self) -> &ColumnId {
        &self.root
    }

    pub fn rank_column(&self) -> &Column {
        &self.rank
    }

    /// Let the rank column read ranks from `source`
    ///
    /// Rank columns restored into the tree are bound as well.
    pub fn set_rank_source(&mut self, source: Arc<dyn RankSource>) {
        let columns = std::iter::once(&mut self.rank).chain(self.columns.values_mut());
        for col in columns {
            if let ColumnKind::Rank(rank) = col.kind_mut() {
                rank.bind(source.clone());
            }
        }
    }

    pub fn events(&self) -> &Emitter<ColumnEvent> {
        &self.events
    }

    /// Ids of the top-level columns in display order
    pub fn children(&self) -> &[ColumnId] {
        &self.roots
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        if *id == self.root {
            return Some(&self.rank);
        }
        self.columns.get(id)
    }

    pub fn contains(&self, id: &ColumnId) -> bool {
        *id == self.root || self.columns.contains_key(id)
    }

    /// Number of columns in the tree below the rank column
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Every column, depth-first in display order after the rank column
    pub fn flat_columns(&self) -> Vec<&Column> {
        self.walk()
            .into_iter()
            .filter_map(|(id, _)| self.column(id))
            .collect()
    }

    /// Depth-first search for the first column matching `predicate`
    pub fn find(&self, predicate: impl Fn(&Column) -> bool) -> Option<&Column> {
        self.flat_columns().into_iter().find(|c| predicate(c))
    }

    fn walk(&self) -> Vec<(&ColumnId, usize)> {
        fn visit<'a>(
            ranking: &'a Ranking,
            ids: &'a [ColumnId],
            depth: usize,
            out: &mut Vec<(&'a ColumnId, usize)>,
        ) {
            for id in ids {
                out.push((id, depth));
                if let Some(col) = ranking.columns.get(id) {
                    visit(ranking, col.children(), depth + 1, out);
                }
            }
        }
        let mut out = Vec::with_capacity(self.columns.len() + 1);
        out.push((&self.root, 0));
        visit(self, &self.roots, 0, &mut out);
        out
    }

    fn emit(&self, column: &ColumnId, kinds: &[EventKind], subject: Option<&ColumnId>) {
        for kind in kinds {
            self.events.fire(&ColumnEvent {
                kind: *kind,
                ranking: self.id.clone(),
                column: column.clone(),
                subject: subject.cloned(),
            });
        }
    }

    fn column_mut(&mut self, id: &ColumnId) -> Result<&mut Column, ModelError> {
        if *id == self.root {
            return Ok(&mut self.rank);
        }
        self.columns
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownColumn(id.clone()))
    }

    // --- structure ---

    /// Append a detached column at the top level
    pub fn push(&mut self, tree: ColumnTree) -> ColumnId {
        let index = self.roots.len();
        self.insert(index, tree)
    }

    /// Insert a detached column at the top level, clamping `index`
    pub fn insert(&mut self, index: usize, mut tree: ColumnTree) -> ColumnId {
        let id = tree.id().clone();
        tree.column.set_parent(None);
        self.attach(tree);
        let index = index.min(self.roots.len());
        self.roots.insert(index, id.clone());
        let root = self.root.clone();
        self.emit(&root, &STRUCTURE_CHANGED_ADD, Some(&id));
        id
    }

    /// Append a detached column to a composite
    ///
    /// `weight` is the share the child takes in a stack; NaN gives it an
    /// equal share. It is ignored for other composites.
    pub fn push_child(
        &mut self,
        parent: &ColumnId,
        tree: ColumnTree,
        weight: f64,
    ) -> Result<ColumnId, ModelError> {
        let index = self.column(parent).map(|c| c.children().len()).unwrap_or(0);
        self.insert_child(parent, index, tree, weight)
    }

    pub fn insert_child(
        &mut self,
        parent: &ColumnId,
        index: usize,
        mut tree: ColumnTree,
        weight: f64,
    ) -> Result<ColumnId, ModelError> {
        let id = tree.id().clone();
        let parent_col = self.column_mut(parent)?;
        match parent_col.kind_mut() {
            ColumnKind::Stack(stack) => stack.insert_child(index, id.clone(), weight),
            ColumnKind::Composite(composite) => {
                let index = index.min(composite.children.len());
                composite.children.insert(index, id.clone());
            }
            _ => return Err(ModelError::NotComposite(parent.clone())),
        }
        tree.column.set_parent(Some(parent.clone()));
        self.attach(tree);
        self.emit(parent, &STRUCTURE_CHANGED_ADD, Some(&id));
        Ok(id)
    }

    /// Move every column of a tree into the arena without firing events
    fn attach(&mut self, tree: ColumnTree) {
        let ColumnTree { column, children } = tree;
        self.columns.insert(column.id().clone(), column);
        for child in children {
            self.attach(child);
        }
    }

    /// Detach a column and its descendants
    ///
    /// Returns `None`, and fires nothing, when the column is not part of this
    /// ranking, so removing twice is harmless.
    pub fn remove(&mut self, id: &ColumnId) -> Option<ColumnTree> {
        let parent = self.columns.get(id)?.parent().cloned();
        match &parent {
            Some(parent_id) => {
                if let Some(parent_col) = self.columns.get_mut(parent_id) {
                    match parent_col.kind_mut() {
                        ColumnKind::Stack(stack) => {
                            stack.remove_child(id);
                        }
                        kind => {
                            if let Some(children) = kind.children_mut() {
                                children.retain(|c| c != id);
                            }
                        }
                    }
                }
            }
            None => self.roots.retain(|c| c != id),
        }

        let mut tree = self.detach(id)?;
        tree.column.set_parent(None);

        let removed = tree.ids();
        let before = self.sort_criteria.len();
        self.sort_criteria.retain(|c| !removed.contains(&c.column));

        let source = parent.unwrap_or_else(|| self.root.clone());
        self.emit(&source, &STRUCTURE_CHANGED_REMOVE, Some(id));
        if self.sort_criteria.len() != before {
            let root = self.root.clone();
            self.emit(&root, &[EventKind::SortCriteriaChanged], None);
        }
        Some(tree)
    }

    fn detach(&mut self, id: &ColumnId) -> Option<ColumnTree> {
        let column = self.columns.shift_remove(id)?;
        let children = column
            .children()
            .to_vec()
            .iter()
            .filter_map(|child| self.detach(child))
            .collect();
        Some(ColumnTree { column, children })
    }

    // --- column properties ---

    pub fn set_width(&mut self, id: &ColumnId, width: f32) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        if col.width() == width {
            return Ok(());
        }
        col.set_width(width);
        self.emit(
            id,
            &[
                EventKind::WidthChanged,
                EventKind::DirtyHeader,
                EventKind::DirtyValues,
                EventKind::Dirty,
            ],
            None,
        );
        Ok(())
    }

    pub fn set_label(&mut self, id: &ColumnId, label: impl Into<String>) -> Result<(), ModelError> {
        let label = label.into();
        let col = self.column_mut(id)?;
        if col.label() == label {
            return Ok(());
        }
        col.set_label(label);
        self.emit(
            id,
            &[EventKind::LabelChanged, EventKind::DirtyHeader, EventKind::Dirty],
            None,
        );
        Ok(())
    }

    pub fn set_visible(&mut self, id: &ColumnId, visible: bool) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        if col.is_visible() == visible {
            return Ok(());
        }
        col.set_visible(visible);
        self.emit(
            id,
            &[
                EventKind::VisibilityChanged,
                EventKind::DirtyHeader,
                EventKind::DirtyValues,
                EventKind::Dirty,
            ],
            None,
        );
        Ok(())
    }

    pub fn set_color(&mut self, id: &ColumnId, color: Option<String>) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        if col.color() == color.as_deref() {
            return Ok(());
        }
        col.set_color(color);
        self.emit(
            id,
            &[EventKind::DirtyHeader, EventKind::DirtyValues, EventKind::Dirty],
            None,
        );
        Ok(())
    }

    /// Replace the filter of a leaf column, `None` clears it
    pub fn set_filter(
        &mut self,
        id: &ColumnId,
        filter: Option<ColumnFilter>,
    ) -> Result<(), ModelError> {
        if self.column_mut(id)?.set_filter(filter)? {
            self.emit(
                id,
                &[EventKind::FilterChanged, EventKind::DirtyValues, EventKind::Dirty],
                None,
            );
        }
        Ok(())
    }

    /// Replace the filter from its serialized form
    pub fn set_filter_value(&mut self, id: &ColumnId, value: Value) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        let filter = if value.is_null() {
            None
        } else {
            Some(col.parse_filter(value)?)
        };
        self.set_filter(id, filter)
    }

    pub fn set_mapping(&mut self, id: &ColumnId, mapping: MappingFunction) -> Result<(), ModelError> {
        if self.column_mut(id)?.set_mapping(mapping)? {
            self.emit(
                id,
                &[
                    EventKind::MappingChanged,
                    EventKind::ValueChanged,
                    EventKind::DirtyHeader,
                    EventKind::DirtyValues,
                    EventKind::Dirty,
                ],
                None,
            );
        }
        Ok(())
    }

    pub fn set_sort_method(&mut self, id: &ColumnId, method: SortMethod) -> Result<(), ModelError> {
        if self.column_mut(id)?.set_sort_method(method)? {
            self.emit(
                id,
                &[EventKind::ValueChanged, EventKind::DirtyValues, EventKind::Dirty],
                None,
            );
        }
        Ok(())
    }

    /// Replace the weights of a stack; they are normalized to sum 1
    pub fn set_weights(&mut self, id: &ColumnId, weights: &[f64]) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        let ColumnKind::Stack(stack) = col.kind_mut() else {
            return Err(ModelError::Unsupported {
                column: id.clone(),
                operation: "weights",
            });
        };
        if weights.len() != stack.children.len() {
            return Err(ModelError::WeightCount {
                expected: stack.children.len(),
                actual: weights.len(),
            });
        }
        if stack.set_weights(weights) {
            self.emit(
                id,
                &[
                    EventKind::WeightsChanged,
                    EventKind::ValueChanged,
                    EventKind::DirtyHeader,
                    EventKind::DirtyValues,
                    EventKind::Dirty,
                ],
                None,
            );
        }
        Ok(())
    }

    /// Replace the link pattern of a link column
    pub fn set_link(&mut self, id: &ColumnId, link: Option<String>) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        let ColumnKind::Link(column) = col.kind_mut() else {
            return Err(ModelError::Unsupported {
                column: id.clone(),
                operation: "link",
            });
        };
        if column.set_link(link.filter(|l| !l.is_empty())) {
            self.emit(
                id,
                &[
                    EventKind::LinkChanged,
                    EventKind::DirtyHeader,
                    EventKind::DirtyValues,
                    EventKind::Dirty,
                ],
                None,
            );
        }
        Ok(())
    }

    pub fn set_collapsed(&mut self, id: &ColumnId, collapsed: bool) -> Result<(), ModelError> {
        let col = self.column_mut(id)?;
        let ColumnKind::Stack(stack) = col.kind_mut() else {
            return Err(ModelError::Unsupported {
                column: id.clone(),
                operation: "collapse",
            });
        };
        if stack.is_collapsed() != collapsed {
            stack.set_collapsed(collapsed);
            self.emit(id, &[EventKind::DirtyHeader, EventKind::Dirty], None);
        }
        Ok(())
    }

    // --- sort criteria ---

    pub fn sort_criteria(&self) -> &[SortCriterion] {
        &self.sort_criteria
    }

    /// Sort by a single column
    pub fn sort_by(&mut self, id: &ColumnId, asc: bool) -> Result<(), ModelError> {
        self.set_sort_criteria(vec![SortCriterion::new(id.clone(), asc)])
    }

    /// Replace all sort criteria, primary criterion first
    pub fn set_sort_criteria(&mut self, criteria: Vec<SortCriterion>) -> Result<(), ModelError> {
        if let Some(unknown) = criteria.iter().find(|c| !self.contains(&c.column)) {
            return Err(ModelError::UnknownColumn(unknown.column.clone()));
        }
        if criteria == self.sort_criteria {
            return Ok(());
        }
        self.sort_criteria = criteria;
        let root = self.root.clone();
        self.emit(
            &root,
            &[
                EventKind::SortCriteriaChanged,
                EventKind::DirtyValues,
                EventKind::Dirty,
            ],
            None,
        );
        Ok(())
    }

    // --- evaluation ---

    /// Compare two rows by the sort criteria
    ///
    /// Missing values sort last in both directions. Rows equal under every
    /// criterion compare equal; callers break ties.
    pub fn compare(&self, a: &DataRow, b: &DataRow) -> Ordering {
        for criterion in &self.sort_criteria {
            let ord = self.compare_by(&criterion.column, a, b, criterion.asc);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Compare two rows by one column in the given direction
    pub fn compare_by(&self, id: &ColumnId, a: &DataRow, b: &DataRow, asc: bool) -> Ordering {
        let Some(col) = self.column(id) else {
            return Ordering::Equal;
        };
        let directed = |ord: Ordering| if asc { ord } else { ord.reverse() };
        match col.kind() {
            ColumnKind::Stack(_) => directed(self.value(id, a).total_cmp(&self.value(id, b))),
            ColumnKind::Composite(composite) => composite
                .children
                .iter()
                .map(|child| self.compare_by(child, a, b, asc))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal),
            _ => match (col.is_missing_leaf(a), col.is_missing_leaf(b)) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => directed(col.compare_leaf(a, b)),
            },
        }
    }

    /// Normalized value of a column for a row, NaN when missing or not numeric
    ///
    /// A stack sums its children's values by weight; missing children count
    /// as zero, so a stack always has a value.
    pub fn value(&self, id: &ColumnId, row: &DataRow) -> f64 {
        let Some(col) = self.column(id) else {
            return f64::NAN;
        };
        match col.kind() {
            ColumnKind::Stack(stack) => stack
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let v = self.value(child, row);
                    if v.is_nan() {
                        0.0
                    } else {
                        stack.weight(i) * v
                    }
                })
                .sum(),
            ColumnKind::Composite(_) => f64::NAN,
            _ => col.number_leaf(row),
        }
    }

    pub fn is_missing(&self, id: &ColumnId, row: &DataRow) -> bool {
        self.column(id).map_or(true, |col| col.is_missing_leaf(row))
    }

    /// Whether a row passes the filters of every column
    pub fn matches(&self, row: &DataRow) -> bool {
        self.columns.values().all(|col| col.matches_leaf(row))
    }

    pub fn is_filtered(&self) -> bool {
        self.columns.values().any(Column::is_filtered)
    }

    /// Cell contract for renderers
    pub fn cell(&self, id: &ColumnId, row: &DataRow) -> Option<CellValue> {
        let col = self.column(id)?;
        let cell = match col.kind() {
            ColumnKind::Stack(_) => {
                let v = self.value(id, row);
                CellValue {
                    raw_value: Value::from(v),
                    normalized_value: Some(v),
                    is_missing: false,
                    label: Some(format_number(v)),
                }
            }
            ColumnKind::Composite(_) => CellValue {
                raw_value: Value::Null,
                normalized_value: None,
                is_missing: false,
                label: None,
            },
            kind => {
                let v = col.number_leaf(row);
                CellValue {
                    raw_value: col.raw(row),
                    normalized_value: (kind.is_numeric() && !v.is_nan()).then_some(v),
                    is_missing: col.is_missing_leaf(row),
                    label: col.label_leaf(row),
                }
            }
        };
        Some(cell)
    }

    /// Header geometry of the visible columns, depth-first
    pub fn layout(&self) -> Vec<ColumnLayout> {
        self.walk()
            .into_iter()
            .filter_map(|(id, depth)| {
                let col = self.column(id)?;
                col.is_visible().then(|| ColumnLayout {
                    id: id.clone(),
                    label: col.label().to_string(),
                    width: col.width(),
                    color: col.color().map(str::to_string),
                    depth,
                })
            })
            .collect()
    }

    // --- grouping ---

    /// Summary over every number of a column across a group of rows
    ///
    /// Multi-valued cells contribute all their values. `raw` selects raw
    /// units (for labels) over normalized values (for geometry).
    pub fn group_box_plot(
        &self,
        id: &ColumnId,
        rows: &[DataRow],
        raw: bool,
    ) -> Result<LazyBoxPlot, ModelError> {
        let col = self
            .columns
            .get(id)
            .ok_or_else(|| ModelError::UnknownColumn(id.clone()))?;
        let desc = col.desc();
        let values: Vec<f64> = match col.kind() {
            ColumnKind::Number(c) if raw => rows.iter().flat_map(|r| c.raw_numbers(desc, r)).collect(),
            ColumnKind::Number(c) => rows.iter().flat_map(|r| c.numbers(desc, r)).collect(),
            ColumnKind::BoxPlot(c) if raw => rows.iter().map(|r| c.raw_number(desc, r)).collect(),
            ColumnKind::BoxPlot(c) => rows.iter().map(|r| c.number(desc, r)).collect(),
            ColumnKind::Stack(_) => rows.iter().map(|r| self.value(id, r)).collect(),
            kind if kind.is_numeric() => rows.iter().map(|r| col.number_leaf(r)).collect(),
            _ => {
                return Err(ModelError::Unsupported {
                    column: id.clone(),
                    operation: "box plot",
                })
            }
        };
        Ok(LazyBoxPlot::new(values))
    }

    /// Group row indices by the category of a categorical column
    ///
    /// Groups follow the category order; rows without a category end up in
    /// [`MISSING_GROUP`].
    pub fn group_by(
        &self,
        id: &ColumnId,
        rows: &[DataRow],
    ) -> Result<IndexMap<String, Vec<usize>>, ModelError> {
        let col = self
            .columns
            .get(id)
            .ok_or_else(|| ModelError::UnknownColumn(id.clone()))?;
        let ColumnKind::Categorical(c) = col.kind() else {
            return Err(ModelError::Unsupported {
                column: id.clone(),
                operation: "grouping",
            });
        };
        let mut groups: IndexMap<String, Vec<usize>> = c
            .categories()
            .iter()
            .map(|cat| (cat.name.clone(), Vec::new()))
            .collect();
        for row in rows {
            let key = c
                .category(col.desc(), row)
                .map_or(MISSING_GROUP, |cat| cat.name.as_str());
            groups.entry(key.to_string()).or_default().push(row.index);
        }
        groups.retain(|_, rows| !rows.is_empty());
        Ok(groups)
    }

    // --- order bookkeeping ---

    /// Most recent successfully applied order, empty before the first sort
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn sort_state(&self) -> SortState {
        self.state
    }

    /// Enter the sorting state
    ///
    /// Overlapping requests keep the state from before the first of them.
    pub fn begin_sort(&mut self) {
        if self.state != SortState::Sorting {
            self.settled = self.state;
        }
        self.state = SortState::Sorting;
    }

    pub fn apply_order(&mut self, order: Vec<usize>) {
        self.order = order;
        self.state = SortState::Sorted;
        self.settled = SortState::Sorted;
        let root = self.root.clone();
        self.emit(&root, &[EventKind::DirtyValues, EventKind::Dirty], None);
    }

    /// Leave the sorting state without touching the order
    pub fn abort_sort(&mut self) {
        self.state = self.settled;
    }

    // --- serialization ---

    /// Snapshot of one column and its subtree
    pub fn dump_column(
        &self,
        id: &ColumnId,
        to_ref: &dyn Fn(&ColumnDesc) -> DescRef,
    ) -> Option<ColumnDump> {
        let col = self.column(id)?;
        let mut dump = col.dump_own(to_ref);
        dump.children = col
            .children()
            .iter()
            .filter_map(|child| self.dump_column(child, to_ref))
            .collect();
        Some(dump)
    }

    pub fn dump(&self, to_ref: &dyn Fn(&ColumnDesc) -> DescRef) -> RankingDump {
        RankingDump {
            id: self.id.clone(),
            rank: Some(self.rank.dump_own(to_ref)),
            sort_criteria: self
                .sort_criteria
                .iter()
                .map(|c| SortCriterionDump {
                    column: c.column.clone(),
                    asc: c.asc,
                })
                .collect(),
            children: self
                .roots
                .iter()
                .filter_map(|id| self.dump_column(id, to_ref))
                .collect(),
        }
    }

    /// Rebuild a ranking from a dump under the given id
    ///
    /// `mint` picks the id of every restored column; sort criteria follow
    /// the renamed columns. No events fire while rebuilding.
    pub fn from_dump(
        id: RankingId,
        dump: &RankingDump,
        resolve: &dyn Fn(&DescRef) -> Option<Arc<ColumnDesc>>,
        registry: &ColumnRegistry,
        mint: &mut dyn FnMut(&ColumnId) -> ColumnId,
    ) -> Ranking {
        let mut ranking = Ranking::new(id);
        let mut renamed: AHashMap<ColumnId, ColumnId> = AHashMap::new();
        if let Some(rank) = &dump.rank {
            ranking.rank.restore_state(rank, registry);
            renamed.insert(rank.id.clone(), ranking.root.clone());
        }
        let mut tracking = |old: &ColumnId| {
            let new = mint(old);
            renamed.insert(old.clone(), new.clone());
            new
        };
        for child in &dump.children {
            if let Some(mut tree) = ColumnTree::restore(child, resolve, registry, &mut tracking) {
                tree.column.set_parent(None);
                ranking.roots.push(tree.id().clone());
                ranking.attach(tree);
            }
        }
        ranking.sort_criteria = dump
            .sort_criteria
            .iter()
            .filter_map(|c| {
                renamed
                    .get(&c.column)
                    .map(|id| SortCriterion::new(id.clone(), c.asc))
            })
            .collect();
        ranking
    }

    /// Serialize the sort criteria and filters for a remote backend
    pub fn sort_description(&self, to_ref: &dyn Fn(&ColumnDesc) -> DescRef) -> SortDescription {
        SortDescription {
            ranking: self.id.clone(),
            criteria: self
                .sort_criteria
                .iter()
                .filter_map(|c| {
                    self.sort_column(&c.column, to_ref).map(|column| SortTerm {
                        column,
                        asc: c.asc,
                    })
                })
                .collect(),
            filters: self
                .flat_columns()
                .into_iter()
                .filter(|col| col.is_filtered())
                .filter_map(|col| {
                    col.filter().map(|f| FilterTerm {
                        desc: to_ref(col.desc()),
                        filter: f.to_value(),
                    })
                })
                .collect(),
        }
    }

    fn sort_column(
        &self,
        id: &ColumnId,
        to_ref: &dyn Fn(&ColumnDesc) -> DescRef,
    ) -> Option<SortColumn> {
        let col = self.column(id)?;
        let column = match col.kind() {
            ColumnKind::Stack(stack) => SortColumn::Stack {
                children: stack
                    .children
                    .iter()
                    .enumerate()
                    .filter_map(|(i, child)| {
                        self.sort_column(child, to_ref).map(|column| WeightedSortColumn {
                            column,
                            weight: stack.weight(i),
                        })
                    })
                    .collect(),
            },
            ColumnKind::Composite(composite) => SortColumn::Composite {
                children: composite
                    .children
                    .iter()
                    .filter_map(|child| self.sort_column(child, to_ref))
                    .collect(),
            },
            _ => SortColumn::Column {
                desc: to_ref(col.desc()),
                map: col.mapping().map(MappingFunction::to_desc),
                sort_method: col.sort_method(),
            },
        };
        Some(column)
    }
}

const STRUCTURE_CHANGED_ADD: [EventKind; 4] = [
    EventKind::AddColumn,
    EventKind::DirtyHeader,
    EventKind::DirtyValues,
    EventKind::Dirty,
];

const STRUCTURE_CHANGED_REMOVE: [EventKind; 4] = [
    EventKind::RemoveColumn,
    EventKind::DirtyHeader,
    EventKind::DirtyValues,
    EventKind::Dirty,
];

impl fmt::Debug for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ranking")
            .field("id", &self.id)
            .field("children", &self.roots)
            .field("columns", &self.columns.len())
            .field("sort_criteria", &self.sort_criteria)
            .field("state", &self.state)
            .finish()
    }
}
