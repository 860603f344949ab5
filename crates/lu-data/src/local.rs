//! In-memory data provider
//!
//! Rows live in memory as JSON objects. Sorting runs the ranking's filter and
//! comparator over the rows; the resulting ranks are kept in a side table per
//! ranking and break ties in the next sort.

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use lu_core::mapping::resolve_domain;
use lu_core::value::as_text;
use lu_core::{ColumnDesc, ColumnRegistry, DataRow, DescRef, RankSource, Ranking, RankingId};

use crate::column_set::ColumnSet;
use crate::config::ProviderConfig;
use crate::provider::{DataProvider, ProviderCore, ViewRow};
use crate::ProviderError;

/// Row key to rank in the last order of a ranking
type RankTable = AHashMap<String, usize>;

/// Rank table shared with the rank column of its ranking
#[derive(Debug, Clone, Default)]
struct SharedRanks(Arc<RwLock<RankTable>>);

/// The ranks of one ranking, read through the row identity
struct RankLookup {
    ranks: SharedRanks,
    identity: Option<String>,
}

impl RankSource for RankLookup {
    fn rank(&self, row: &DataRow) -> Option<usize> {
        let key = row_key(self.identity.as_deref(), row.index, Some(row.value));
        // may run while `order` holds the same table
        self.ranks.0.read_recursive().get(&key).copied()
    }
}

pub struct LocalDataProvider {
    core: ProviderCore,
    rows: Vec<Value>,
    columns: ColumnSet,
    /// Row key to row position, only filled with an identity field
    keys: AHashMap<String, usize>,
    ranks: RwLock<AHashMap<RankingId, SharedRanks>>,
}

impl LocalDataProvider {
    pub fn new(rows: Vec<Value>, columns: Vec<ColumnDesc>) -> Self {
        Self::with_options(rows, columns, ProviderConfig::default(), ColumnRegistry::new())
    }

    /// Build a provider with custom configuration and column types
    ///
    /// Missing markers in the fields of numeric descriptors become `null`
    /// and numeric descriptors without a complete domain get one inferred
    /// from the rows. Text columns keep their values as given.
    pub fn with_options(
        mut rows: Vec<Value>,
        columns: Vec<ColumnDesc>,
        config: ProviderConfig,
        registry: ColumnRegistry,
    ) -> Self {
        let numeric: Vec<&str> = columns
            .iter()
            .filter(|desc| is_numeric(desc))
            .filter_map(|desc| desc.column.as_deref())
            .collect();
        let replaced: usize = rows
            .iter_mut()
            .map(|row| config.missing.normalize_row(row, &numeric))
            .sum();

        let columns: Vec<ColumnDesc> = columns
            .into_iter()
            .map(|mut desc| {
                infer_numeric_domain(&mut desc, &rows);
                desc
            })
            .collect();

        let keys = match &config.identity {
            Some(field) => rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| as_text(row.get(field)).map(|key| (key, i)))
                .collect(),
            None => AHashMap::new(),
        };

        debug!(
            rows = rows.len(),
            columns = columns.len(),
            missing = replaced,
            "local provider created"
        );
        Self {
            core: ProviderCore::new(registry, config),
            rows,
            columns: ColumnSet::new(columns),
            keys,
            ranks: RwLock::new(AHashMap::new()),
        }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Descriptors this provider was created with
    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Create a ranking holding one column per known descriptor
    pub fn derive_default(&self) -> Result<RankingId, ProviderError> {
        let ranking = self.push_ranking(None)?;
        for desc in self.columns.descs() {
            self.push(&ranking, desc);
        }
        Ok(ranking)
    }

    fn order(&self, ranking: &Ranking) -> Vec<usize> {
        let table = self.ranks.read().get(ranking.id()).cloned().unwrap_or_default();
        let previous = table.0.read();
        // rows without a previous rank tie-break as if they were first
        let rank_of = |index: usize| previous.get(&self.row_key(index)).copied().unwrap_or(0);

        let mut helper: Vec<(DataRow<'_>, usize)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, value)| DataRow::new(i, value))
            .filter(|row| ranking.matches(row))
            .map(|row| {
                let rank = rank_of(row.index);
                (row, rank)
            })
            .collect();

        helper.sort_by(|(a, rank_a), (b, rank_b)| {
            ranking
                .compare(a, b)
                .then_with(|| rank_a.cmp(rank_b))
                .then_with(|| a.index.cmp(&b.index))
        });
        helper.into_iter().map(|(row, _)| row.index).collect()
    }

    fn store_ranks(&self, ranking: &RankingId, order: &[usize]) {
        let table: RankTable = order
            .iter()
            .enumerate()
            .map(|(rank, index)| (self.row_key(*index), rank))
            .collect();
        let shared = self.ranks.write().entry(ranking.clone()).or_default().clone();
        *shared.0.write() = table;
    }
}

#[async_trait]
impl DataProvider for LocalDataProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    async fn sort(&self, ranking: &RankingId) -> Result<Vec<usize>, ProviderError> {
        let ticket = self.core.begin_sort(ranking)?;
        let order = self
            .core
            .with_ranking(ranking, |r| self.order(r))
            .ok_or_else(|| ProviderError::UnknownRanking(ranking.clone()));
        self.core
            .complete_sort(ticket, order, |order| self.store_ranks(ranking, order))
    }

    async fn view(&self, indices: &[usize]) -> Result<Vec<ViewRow>, ProviderError> {
        indices
            .iter()
            .map(|&index| {
                self.rows
                    .get(index)
                    .map(|value| ViewRow {
                        index,
                        value: value.clone(),
                    })
                    .ok_or(ProviderError::InvalidRow(index))
            })
            .collect()
    }

    fn to_desc_ref(&self, desc: &ColumnDesc) -> DescRef {
        self.columns.to_desc_ref(desc)
    }

    fn from_desc_ref(&self, desc: &DescRef) -> Option<Arc<ColumnDesc>> {
        match desc {
            DescRef::Key(_) => self.columns.from_desc_ref(desc),
            DescRef::Inline(inline) => {
                let mut desc = (**inline).clone();
                self.complete_desc(&mut desc);
                Some(Arc::new(desc))
            }
        }
    }

    fn complete_desc(&self, desc: &mut ColumnDesc) {
        infer_numeric_domain(desc, &self.rows);
    }

    fn ranking_cloned(&self, ranking: &RankingId, existing: Option<&RankingId>) {
        let mut ranks = self.ranks.write();
        let copied = existing
            .and_then(|e| ranks.get(e))
            .map(|shared| shared.0.read().clone())
            .unwrap_or_default();
        ranks.insert(ranking.clone(), SharedRanks(Arc::new(RwLock::new(copied))));
    }

    fn clean_up_ranking(&self, ranking: &RankingId) {
        self.ranks.write().remove(ranking);
    }

    fn rank_source(&self, ranking: &RankingId) -> Option<Arc<dyn RankSource>> {
        let ranks = self.ranks.read().get(ranking)?.clone();
        Some(Arc::new(RankLookup {
            ranks,
            identity: self.core.config().identity.clone(),
        }))
    }

    fn rank_of(&self, ranking: &RankingId, index: usize) -> Option<usize> {
        let shared = self.ranks.read().get(ranking)?.clone();
        let rank = shared.0.read().get(&self.row_key(index)).copied();
        rank
    }

    fn row_key(&self, index: usize) -> String {
        row_key(self.core.config().identity.as_deref(), index, self.rows.get(index))
    }

    fn row_index(&self, key: &str) -> Option<usize> {
        let index = match self.core.config().identity {
            Some(_) => match key.strip_prefix(UNKEYED_PREFIX) {
                Some(index) => index.parse().ok(),
                None => return self.keys.get(key).copied(),
            },
            None => key.parse().ok(),
        };
        index.filter(|i| *i < self.rows.len())
    }
}

/// Marks the keys of rows lacking an identity value
const UNKEYED_PREFIX: char = '#';

/// Identity value of a row, or its position
///
/// With an identity field configured, rows without a value for it get
/// `#<index>` so they never collide with a real identity value.
fn row_key(identity: Option<&str>, index: usize, row: Option<&Value>) -> String {
    match identity {
        Some(field) => row
            .and_then(|row| as_text(row.get(field)))
            .unwrap_or_else(|| format!("{UNKEYED_PREFIX}{index}")),
        None => index.to_string(),
    }
}

fn is_numeric(desc: &ColumnDesc) -> bool {
    matches!(desc.kind.as_str(), "number" | "boxplot")
}

/// Infer the missing domain bounds of number and box plot descriptors
fn infer_numeric_domain(desc: &mut ColumnDesc, rows: &[Value]) {
    if is_numeric(desc) && resolve_domain(desc, rows) {
        debug!(column = ?desc.column, domain = ?desc.domain, "domain inferred");
    }
}

impl std::fmt::Debug for LocalDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDataProvider")
            .field("rows", &self.rows.len())
            .field("columns", &self.columns.len())
            .field("core", &self.core)
            .finish()
    }
}
