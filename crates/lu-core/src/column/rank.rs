//! The rank column every ranking starts with
//!
//! Ranks are not part of the data. A backing keeps the rank of every row in
//! the last order it produced and exposes it through a [`RankSource`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::value::DataRow;

/// Type tag of rank columns
pub const RANK_TYPE: &str = "rank";

/// Width of a fresh rank column
pub const RANK_WIDTH: f32 = 50.0;

/// Lookup of the current rank of a row, zero-based
pub trait RankSource: Send + Sync {
    fn rank(&self, row: &DataRow) -> Option<usize>;
}

/// Column showing the one-based rank of a row
#[derive(Clone, Default)]
pub struct RankColumn {
    source: Option<Arc<dyn RankSource>>,
}

impl RankColumn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn bind(&mut self, source: Arc<dyn RankSource>) {
        self.source = Some(source);
    }

    /// Zero-based rank, `None` before the row was ranked
    pub fn rank(&self, row: &DataRow) -> Option<usize> {
        self.source.as_ref()?.rank(row)
    }

    pub fn compare(&self, a: &DataRow, b: &DataRow) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    pub fn label(&self, row: &DataRow) -> Option<String> {
        self.rank(row).map(|rank| (rank + 1).to_string())
    }
}

impl fmt::Debug for RankColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankColumn")
            .field("bound", &self.is_bound())
            .finish()
    }
}
