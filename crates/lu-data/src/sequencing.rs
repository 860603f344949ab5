//! Per-ranking sort request sequencing
//!
//! Every sort request takes a ticket with a monotonically increasing number
//! for its ranking. Only the holder of the newest ticket may apply its
//! result; older requests are superseded and their results dropped.

use ahash::AHashMap;
use parking_lot::Mutex;

use lu_core::RankingId;

/// Proof of a started sort request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTicket {
    pub ranking: RankingId,
    pub sequence: u64,
}

/// Issues and checks sort tickets
#[derive(Debug, Default)]
pub struct SortSequencer {
    latest: Mutex<AHashMap<RankingId, u64>>,
}

impl SortSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every earlier one for the same ranking
    pub fn issue(&self, ranking: &RankingId) -> SortTicket {
        let mut latest = self.latest.lock();
        let sequence = latest.entry(ranking.clone()).or_insert(0);
        *sequence += 1;
        SortTicket {
            ranking: ranking.clone(),
            sequence: *sequence,
        }
    }

    /// Whether no newer request was issued since `ticket`
    pub fn is_current(&self, ticket: &SortTicket) -> bool {
        self.latest.lock().get(&ticket.ranking) == Some(&ticket.sequence)
    }

    /// Invalidate every pending request of a ranking
    ///
    /// Numbers keep increasing so that a ranking restored under the same id
    /// never accepts a result requested before.
    pub fn invalidate(&self, ranking: &RankingId) {
        if let Some(sequence) = self.latest.lock().get_mut(ranking) {
            *sequence += 1;
        }
    }
}
