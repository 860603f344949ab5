//! The data provider contract
//!
//! [`ProviderCore`] holds the state every provider shares: rankings, column
//! registry, selection, id counters, sort sequencing and the event stream.
//! [`DataProvider`] implements the provider operations on top of it; backings
//! supply `sort`, `view` and the hooks that keep their own per-ranking state in
//! step.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use lu_core::{
    ColumnDesc, ColumnId, ColumnRegistry, ColumnTree, DescRef, Emitter, EventKind, EventKinds,
    ProviderDump, ProviderEvent, RankSource, Ranking, RankingId,
};

use crate::config::ProviderConfig;
use crate::selection::Selection;
use crate::sequencing::{SortSequencer, SortTicket};
use crate::ProviderError;

/// Listener scope under which a provider subscribes to its rankings
const PROVIDER_SCOPE: &str = "provider";

/// A row returned by `view`, stamped with its index in the data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRow {
    pub index: usize,
    pub value: Value,
}

/// State shared by every provider
pub struct ProviderCore {
    registry: Arc<ColumnRegistry>,
    config: ProviderConfig,
    rankings: RwLock<Vec<Ranking>>,
    selection: RwLock<Selection>,
    uid: AtomicUsize,
    ranking_index: AtomicUsize,
    sequencer: SortSequencer,
    events: Arc<Emitter<ProviderEvent>>,
}

impl ProviderCore {
    pub fn new(registry: ColumnRegistry, config: ProviderConfig) -> Self {
        let registry = match config.default_width {
            Some(width) => registry.with_default_width(width),
            None => registry,
        };
        Self {
            registry: Arc::new(registry),
            config,
            rankings: RwLock::new(Vec::new()),
            selection: RwLock::new(Selection::new()),
            uid: AtomicUsize::new(0),
            ranking_index: AtomicUsize::new(0),
            sequencer: SortSequencer::new(),
            events: Arc::new(Emitter::new()),
        }
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Provider event stream
    ///
    /// Listeners run while the provider holds its ranking lock and must not
    /// call back into the provider.
    pub fn events(&self) -> &Emitter<ProviderEvent> {
        &self.events
    }

    /// Current value of the column id counter
    pub fn uid(&self) -> usize {
        self.uid.load(Ordering::SeqCst)
    }

    /// Mint a fresh column id
    pub fn next_id(&self) -> ColumnId {
        ColumnId::nth(self.uid.fetch_add(1, Ordering::SeqCst))
    }

    /// Mint a fresh ranking id
    pub fn next_ranking_id(&self) -> RankingId {
        RankingId::nth(self.ranking_index.fetch_add(1, Ordering::SeqCst))
    }

    pub fn ranking_ids(&self) -> Vec<RankingId> {
        self.rankings.read().iter().map(|r| r.id().clone()).collect()
    }

    pub fn has_ranking(&self, id: &RankingId) -> bool {
        self.rankings.read().iter().any(|r| r.id() == id)
    }

    /// Run `f` on a ranking, `None` when the provider does not own it
    pub fn with_ranking<R>(&self, id: &RankingId, f: impl FnOnce(&Ranking) -> R) -> Option<R> {
        let rankings = self.rankings.read();
        rankings.iter().find(|r| r.id() == id).map(f)
    }

    /// Mutate a ranking; its change events fire before this returns
    pub fn with_ranking_mut<R>(
        &self,
        id: &RankingId,
        f: impl FnOnce(&mut Ranking) -> R,
    ) -> Option<R> {
        let mut rankings = self.rankings.write();
        rankings.iter_mut().find(|r| r.id() == id).map(f)
    }

    /// Run `f` over every ranking in order
    pub fn with_rankings<R>(&self, f: impl FnOnce(&[Ranking]) -> R) -> R {
        f(&self.rankings.read())
    }

    /// Forward the structural and dirty events of a ranking
    fn wire(&self, ranking: &Ranking) {
        let events = self.events.clone();
        let kinds = EventKinds::of(&[EventKind::AddColumn, EventKind::RemoveColumn, EventKind::Dirty]);
        ranking.events().on(kinds, PROVIDER_SCOPE, move |e| {
            let forwarded = match (e.kind, &e.subject) {
                (EventKind::AddColumn, Some(column)) => ProviderEvent::AddColumn {
                    ranking: e.ranking.clone(),
                    parent: e.column.clone(),
                    column: column.clone(),
                },
                (EventKind::RemoveColumn, Some(column)) => ProviderEvent::RemoveColumn {
                    ranking: e.ranking.clone(),
                    parent: e.column.clone(),
                    column: column.clone(),
                },
                _ => ProviderEvent::Dirty,
            };
            events.fire(&forwarded);
        });
    }

    fn unwire(ranking: &Ranking) {
        ranking.events().off(PROVIDER_SCOPE);
    }

    /// Take ownership of a ranking; fires addRanking then dirty
    pub(crate) fn add_ranking(&self, ranking: Ranking) {
        self.wire(&ranking);
        let id = ranking.id().clone();
        self.rankings.write().push(ranking);
        self.events.fire(&ProviderEvent::AddRanking(id));
        self.events.fire(&ProviderEvent::Dirty);
    }

    /// Give up a ranking, `None` when it is not owned
    pub(crate) fn take_ranking(&self, id: &RankingId) -> Option<Ranking> {
        let mut rankings = self.rankings.write();
        let index = rankings.iter().position(|r| r.id() == id)?;
        let ranking = rankings.remove(index);
        drop(rankings);
        Self::unwire(&ranking);
        self.sequencer.invalidate(id);
        Some(ranking)
    }

    /// Swap in restored rankings and counters
    pub(crate) fn replace_rankings(&self, uid: usize, next: Vec<Ranking>) -> Vec<Ranking> {
        for ranking in &next {
            self.wire(ranking);
        }
        let previous = std::mem::replace(&mut *self.rankings.write(), next);
        for ranking in &previous {
            Self::unwire(ranking);
            self.sequencer.invalidate(ranking.id());
        }
        self.uid.store(uid, Ordering::SeqCst);
        self.reconcile_ranking_index();
        previous
    }

    /// Continue ranking ids after the highest `rank{n}` id present
    fn reconcile_ranking_index(&self) {
        let next = self
            .rankings
            .read()
            .iter()
            .filter_map(|r| r.id().sequence())
            .max()
            .map_or(0, |max| max + 1);
        self.ranking_index.fetch_max(next, Ordering::SeqCst);
    }

    /// Enter the sorting state and take a ticket for the request
    pub fn begin_sort(&self, id: &RankingId) -> Result<SortTicket, ProviderError> {
        let mut rankings = self.rankings.write();
        let ranking = rankings
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| ProviderError::UnknownRanking(id.clone()))?;
        ranking.begin_sort();
        let ticket = self.sequencer.issue(id);
        debug!(ranking = %id, sequence = ticket.sequence, "sort started");
        Ok(ticket)
    }

    /// Finish a sort request
    ///
    /// A superseded request changes nothing. A successful result is passed
    /// to `store` and becomes the ranking's order; a failure restores the
    /// state the ranking had before any pending request and keeps its
    /// previous order.
    pub fn complete_sort(
        &self,
        ticket: SortTicket,
        result: Result<Vec<usize>, ProviderError>,
        store: impl FnOnce(&[usize]),
    ) -> Result<Vec<usize>, ProviderError> {
        let mut rankings = self.rankings.write();
        if !self.sequencer.is_current(&ticket) {
            debug!(ranking = %ticket.ranking, sequence = ticket.sequence, "sort superseded");
            return Err(ProviderError::Superseded(ticket.ranking));
        }
        let Some(ranking) = rankings.iter_mut().find(|r| *r.id() == ticket.ranking) else {
            return Err(ProviderError::UnknownRanking(ticket.ranking));
        };
        match result {
            Ok(order) => {
                store(&order);
                ranking.apply_order(order.clone());
                debug!(ranking = %ticket.ranking, rows = order.len(), "sort finished");
                Ok(order)
            }
            Err(e) => {
                ranking.abort_sort();
                warn!(ranking = %ticket.ranking, error = %e, "sort failed");
                Err(e)
            }
        }
    }

    fn selection_changed(&self, changed: bool) {
        if changed {
            self.events.fire(&ProviderEvent::SelectionChanged);
        }
    }
}

impl std::fmt::Debug for ProviderCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCore")
            .field("rankings", &self.ranking_ids())
            .field("uid", &self.uid())
            .field("selected", &self.selection.read().len())
            .finish()
    }
}

/// Data provider operations
///
/// Only [`DataProvider::core`] is required. The default `sort` and `view`
/// reject with [`ProviderError::Unsupported`].
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn core(&self) -> &ProviderCore;

    /// Order the rows of a ranking and remember the order
    async fn sort(&self, _ranking: &RankingId) -> Result<Vec<usize>, ProviderError> {
        Err(ProviderError::Unsupported("sort"))
    }

    /// Materialize rows in the given order
    async fn view(&self, _indices: &[usize]) -> Result<Vec<ViewRow>, ProviderError> {
        Err(ProviderError::Unsupported("view"))
    }

    /// Descriptor reference written to dumps and sort descriptions
    fn to_desc_ref(&self, desc: &ColumnDesc) -> DescRef {
        DescRef::Inline(Box::new(desc.clone()))
    }

    fn from_desc_ref(&self, desc: &DescRef) -> Option<Arc<ColumnDesc>> {
        match desc {
            DescRef::Inline(desc) => Some(Arc::new((**desc).clone())),
            DescRef::Key(_) => None,
        }
    }

    /// Backing hook: fill in descriptor fields that depend on the data
    fn complete_desc(&self, _desc: &mut ColumnDesc) {}

    /// Backing hook: a ranking was created, copying `existing` if given
    fn ranking_cloned(&self, _ranking: &RankingId, _existing: Option<&RankingId>) {}

    /// Backing hook: release the state kept for a removed ranking
    fn clean_up_ranking(&self, _ranking: &RankingId) {}

    /// Backing hook: where the rank column of a ranking reads its ranks
    ///
    /// Called after [`DataProvider::ranking_cloned`].
    fn rank_source(&self, _ranking: &RankingId) -> Option<Arc<dyn RankSource>> {
        None
    }

    /// Rank of a row in the last order of a ranking, if known
    fn rank_of(&self, _ranking: &RankingId, _index: usize) -> Option<usize> {
        None
    }

    /// Stable key of a row, its position unless the backing knows better
    fn row_key(&self, index: usize) -> String {
        index.to_string()
    }

    /// Row position of a key
    fn row_index(&self, key: &str) -> Option<usize> {
        key.parse().ok()
    }

    // --- rankings ---

    /// Create and own a new ranking, copying the columns of `existing`
    ///
    /// The ranking starts with its rank column, which shows the ranks the
    /// backing keeps for it.
    fn push_ranking(&self, existing: Option<&RankingId>) -> Result<RankingId, ProviderError> {
        let core = self.core();
        let template = existing
            .map(|existing| {
                core.with_ranking(existing, |r| r.dump(&|d| DescRef::Inline(Box::new(d.clone()))))
                    .ok_or_else(|| ProviderError::UnknownRanking(existing.clone()))
            })
            .transpose()?;
        let id = core.next_ranking_id();
        let mut ranking = match template {
            None => Ranking::new(id.clone()),
            Some(dump) => {
                let resolve = |d: &DescRef| self.from_desc_ref(d);
                let mut fresh = |_: &ColumnId| core.next_id();
                Ranking::from_dump(id.clone(), &dump, &resolve, core.registry(), &mut fresh)
            }
        };
        self.ranking_cloned(&id, existing);
        if let Some(source) = self.rank_source(&id) {
            ranking.set_rank_source(source);
        }
        core.add_ranking(ranking);
        info!(ranking = %id, "ranking added");
        Ok(id)
    }

    /// Remove a ranking; `false` when this provider does not own it
    fn remove_ranking(&self, id: &RankingId) -> bool {
        let core = self.core();
        let Some(_ranking) = core.take_ranking(id) else {
            return false;
        };
        core.events().fire(&ProviderEvent::RemoveRanking(id.clone()));
        self.clean_up_ranking(id);
        core.events().fire(&ProviderEvent::Dirty);
        info!(ranking = %id, "ranking removed");
        true
    }

    /// Ids of the owned rankings in creation order
    fn rankings(&self) -> Vec<RankingId> {
        self.core().ranking_ids()
    }

    // --- columns ---

    /// Create a detached column with a fresh id, `None` for unknown types
    fn create(&self, desc: &ColumnDesc) -> Option<ColumnTree> {
        let core = self.core();
        if !core.registry().contains(&desc.kind) {
            debug!(kind = %desc.kind, "no column type registered");
            return None;
        }
        let mut desc = desc.clone();
        self.complete_desc(&mut desc);
        core.registry()
            .instantiate(core.next_id(), Arc::new(desc))
            .map(ColumnTree::leaf)
    }

    /// Create a column and append it to a ranking
    fn push(&self, ranking: &RankingId, desc: &ColumnDesc) -> Option<ColumnId> {
        self.insert(ranking, usize::MAX, desc)
    }

    /// Create a column and insert it into a ranking at `index`
    fn insert(&self, ranking: &RankingId, index: usize, desc: &ColumnDesc) -> Option<ColumnId> {
        if !self.core().has_ranking(ranking) {
            return None;
        }
        let tree = self.create(desc)?;
        self.core()
            .with_ranking_mut(ranking, |r| r.insert(index, tree))
    }

    /// Deep copy of an attached column with fresh ids
    fn clone_column(&self, ranking: &RankingId, column: &ColumnId) -> Option<ColumnTree> {
        let core = self.core();
        let dump = core
            .with_ranking(ranking, |r| {
                r.dump_column(column, &|d| DescRef::Inline(Box::new(d.clone())))
            })
            .flatten()?;
        let resolve = |d: &DescRef| self.from_desc_ref(d);
        let mut fresh = |_: &ColumnId| core.next_id();
        ColumnTree::restore(&dump, &resolve, core.registry(), &mut fresh)
    }

    /// Depth-first search over all rankings
    fn find_column(
        &self,
        predicate: &dyn Fn(&lu_core::Column) -> bool,
    ) -> Option<(RankingId, ColumnId)> {
        self.core().with_rankings(|rankings| {
            rankings.iter().find_map(|r| {
                r.find(predicate)
                    .map(|col| (r.id().clone(), col.id().clone()))
            })
        })
    }

    fn find_by_id(&self, id: &ColumnId) -> Option<RankingId> {
        self.find_column(&|col| col.id() == id).map(|(ranking, _)| ranking)
    }

    // --- serialization ---

    fn dump(&self) -> ProviderDump {
        let core = self.core();
        let rankings = core.with_rankings(|rankings| {
            rankings
                .iter()
                .map(|r| r.dump(&|d| self.to_desc_ref(d)))
                .collect()
        });
        ProviderDump {
            uid: core.uid(),
            rankings,
        }
    }

    /// Replace all rankings by the ones of a dump
    ///
    /// Column ids are kept. Columns of unknown type are skipped.
    fn restore(&self, dump: &ProviderDump) {
        let core = self.core();
        let resolve = |d: &DescRef| self.from_desc_ref(d);
        let mut next: Vec<Ranking> = dump
            .rankings
            .iter()
            .map(|rd| {
                let mut keep = |id: &ColumnId| id.clone();
                Ranking::from_dump(rd.id.clone(), rd, &resolve, core.registry(), &mut keep)
            })
            .collect();
        let added: Vec<RankingId> = next.iter().map(|r| r.id().clone()).collect();

        let previous = core.replace_rankings(dump.uid, Vec::new());
        for ranking in &previous {
            core.events().fire(&ProviderEvent::RemoveRanking(ranking.id().clone()));
            self.clean_up_ranking(ranking.id());
        }
        for ranking in &mut next {
            self.ranking_cloned(ranking.id(), None);
            if let Some(source) = self.rank_source(ranking.id()) {
                ranking.set_rank_source(source);
            }
        }
        core.replace_rankings(dump.uid, next);
        for id in &added {
            core.events().fire(&ProviderEvent::AddRanking(id.clone()));
        }
        core.events().fire(&ProviderEvent::Dirty);
        info!(rankings = added.len(), uid = dump.uid, "provider restored");
    }

    // --- selection ---

    fn is_selected(&self, index: usize) -> bool {
        self.core().selection.read().contains(&self.row_key(index))
    }

    fn select(&self, index: usize) {
        let changed = self.core().selection.write().insert(self.row_key(index));
        self.core().selection_changed(changed);
    }

    fn select_all(&self, indices: &[usize]) {
        let keys = indices.iter().map(|i| self.row_key(*i));
        let changed = self.core().selection.write().extend(keys);
        self.core().selection_changed(changed);
    }

    fn set_selection(&self, indices: &[usize]) {
        let keys = indices.iter().map(|i| self.row_key(*i));
        let changed = self.core().selection.write().replace(keys);
        self.core().selection_changed(changed);
    }

    fn deselect(&self, index: usize) {
        let changed = self.core().selection.write().remove(&self.row_key(index));
        self.core().selection_changed(changed);
    }

    fn clear_selection(&self) {
        let changed = self.core().selection.write().clear();
        self.core().selection_changed(changed);
    }

    /// Selected row indices, ascending
    fn selection(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .core()
            .selection
            .read()
            .keys()
            .filter_map(|key| self.row_index(key))
            .collect();
        indices.sort_unstable();
        indices
    }

    /// The selected rows in index order; an empty selection never reaches `view`
    async fn selected_rows(&self) -> Result<Vec<ViewRow>, ProviderError> {
        let indices = self.selection();
        if indices.is_empty() {
            return Ok(Vec::new());
        }
        self.view(&indices).await
    }
}
