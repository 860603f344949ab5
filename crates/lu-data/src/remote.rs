//! Provider backed by a remote service
//!
//! Sorting sends the ranking's [`SortDescription`] to the service and caches
//! the returned order per ranking; viewing fetches rows by index. Service
//! failures surface as [`ProviderError::Remote`] without retries, and a view
//! answering with the wrong number of rows as [`ProviderError::ViewMismatch`].

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use lu_core::{
    ColumnDesc, ColumnRegistry, DataRow, DescRef, RankSource, RankingId, SortDescription,
};

use crate::column_set::ColumnSet;
use crate::config::ProviderConfig;
use crate::provider::{DataProvider, ProviderCore, ViewRow};
use crate::ProviderError;

/// The backend a [`RemoteDataProvider`] delegates to
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Order of the rows passing the description's filters
    async fn sort(&self, desc: &SortDescription) -> anyhow::Result<Vec<usize>>;

    /// Rows at the given indices, in the requested order
    async fn view(&self, indices: &[usize]) -> anyhow::Result<Vec<Value>>;
}

/// Cached order of one ranking
#[derive(Debug, Clone, Default)]
struct CachedOrder {
    order: Vec<usize>,
    positions: AHashMap<usize, usize>,
}

impl CachedOrder {
    fn new(order: &[usize]) -> Self {
        Self {
            order: order.to_vec(),
            positions: order.iter().enumerate().map(|(rank, i)| (*i, rank)).collect(),
        }
    }
}

/// Cached order shared with the rank column of its ranking
#[derive(Debug, Clone, Default)]
struct SharedOrder(Arc<RwLock<CachedOrder>>);

impl SharedOrder {
    fn copy(&self) -> Self {
        Self(Arc::new(RwLock::new(self.0.read().clone())))
    }
}

impl RankSource for SharedOrder {
    fn rank(&self, row: &DataRow) -> Option<usize> {
        self.0.read_recursive().positions.get(&row.index).copied()
    }
}

pub struct RemoteDataProvider {
    core: ProviderCore,
    service: Arc<dyn RemoteService>,
    columns: ColumnSet,
    ranks: RwLock<AHashMap<RankingId, SharedOrder>>,
}

impl RemoteDataProvider {
    pub fn new(service: Arc<dyn RemoteService>, columns: Vec<ColumnDesc>) -> Self {
        Self::with_options(service, columns, ProviderConfig::default(), ColumnRegistry::new())
    }

    pub fn with_options(
        service: Arc<dyn RemoteService>,
        columns: Vec<ColumnDesc>,
        config: ProviderConfig,
        registry: ColumnRegistry,
    ) -> Self {
        Self {
            core: ProviderCore::new(registry, config),
            service,
            columns: ColumnSet::new(columns),
            ranks: RwLock::new(AHashMap::new()),
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Last order received for a ranking
    pub fn cached_order(&self, ranking: &RankingId) -> Option<Vec<usize>> {
        let shared = self.ranks.read().get(ranking)?.clone();
        let order = shared.0.read().order.clone();
        Some(order)
    }

    /// Sort description sent for a ranking
    pub fn sort_description(&self, ranking: &RankingId) -> Option<SortDescription> {
        self.core
            .with_ranking(ranking, |r| r.sort_description(&|d| self.to_desc_ref(d)))
    }
}

#[async_trait]
impl DataProvider for RemoteDataProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    async fn sort(&self, ranking: &RankingId) -> Result<Vec<usize>, ProviderError> {
        let desc = self
            .sort_description(ranking)
            .ok_or_else(|| ProviderError::UnknownRanking(ranking.clone()))?;
        let ticket = self.core.begin_sort(ranking)?;
        debug!(
            ranking = %ranking,
            criteria = desc.criteria.len(),
            filters = desc.filters.len(),
            "requesting remote sort"
        );

        let result = self.service.sort(&desc).await.map_err(ProviderError::Remote);
        self.core.complete_sort(ticket, result, |order| {
            let shared = self.ranks.write().entry(ranking.clone()).or_default().clone();
            *shared.0.write() = CachedOrder::new(order);
        })
    }

    async fn view(&self, indices: &[usize]) -> Result<Vec<ViewRow>, ProviderError> {
        let rows = self
            .service
            .view(indices)
            .await
            .map_err(ProviderError::Remote)?;
        if rows.len() != indices.len() {
            warn!(
                requested = indices.len(),
                received = rows.len(),
                "remote view returned a different number of rows"
            );
            return Err(ProviderError::ViewMismatch {
                requested: indices.len(),
                received: rows.len(),
            });
        }
        Ok(indices
            .iter()
            .zip(rows)
            .map(|(&index, value)| ViewRow { index, value })
            .collect())
    }

    fn to_desc_ref(&self, desc: &ColumnDesc) -> DescRef {
        self.columns.to_desc_ref(desc)
    }

    fn from_desc_ref(&self, desc: &DescRef) -> Option<Arc<ColumnDesc>> {
        self.columns.from_desc_ref(desc)
    }

    fn ranking_cloned(&self, ranking: &RankingId, existing: Option<&RankingId>) {
        let mut ranks = self.ranks.write();
        let copied = existing
            .and_then(|e| ranks.get(e))
            .map(SharedOrder::copy)
            .unwrap_or_default();
        ranks.insert(ranking.clone(), copied);
    }

    fn clean_up_ranking(&self, ranking: &RankingId) {
        self.ranks.write().remove(ranking);
    }

    fn rank_source(&self, ranking: &RankingId) -> Option<Arc<dyn RankSource>> {
        let shared = self.ranks.read().get(ranking)?.clone();
        Some(Arc::new(shared))
    }

    fn rank_of(&self, ranking: &RankingId, index: usize) -> Option<usize> {
        let shared = self.ranks.read().get(ranking)?.clone();
        let rank = shared.0.read().positions.get(&index).copied();
        rank
    }
}

impl std::fmt::Debug for RemoteDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDataProvider")
            .field("columns", &self.columns.len())
            .field("core", &self.core)
            .finish()
    }
}
