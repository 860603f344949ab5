//! Core column model for the ranking engine
//!
//! This crate provides the column type hierarchy, value normalization,
//! box-plot statistics, filters and the ranking root that owns a column tree.
//! Row storage and sorting live in `lu-data`.

pub mod column;
pub mod desc;
pub mod dump;
pub mod events;
pub mod filter;
pub mod mapping;
pub mod ranking;
pub mod registry;
pub mod sorting;
pub mod stats;
pub mod value;

use thiserror::Error;

// Re-export commonly used types
pub use column::{
    CellValue, Column, ColumnId, ColumnKind, ColumnLayout, ColumnTree, RankColumn, RankSource,
};
pub use column::extension::{ColumnExtension, ColumnExtensionFactory};
pub use desc::{Category, CategoryDesc, ColumnDesc, DescRef, MappingDesc};
pub use dump::{ColumnDump, ProviderDump, RankingDump, SortCriterionDump};
pub use events::{ColumnEvent, Emitter, Event, EventKind, EventKinds, ProviderEvent};
pub use filter::{CategoricalFilter, ColumnFilter, NumberFilter, StringFilter};
pub use mapping::{MappingFunction, ScaleKind, ScriptContext, ScriptFn};
pub use ranking::{Ranking, RankingId, SortCriterion, SortState};
pub use registry::{BuiltinKind, ColumnFactory, ColumnRegistry};
pub use sorting::{FilterTerm, SortColumn, SortDescription, SortTerm, WeightedSortColumn};
pub use stats::{BoxPlotData, LazyBoxPlot, SortMethod};
pub use value::DataRow;

/// Errors raised by column tree mutations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("column {0} is not part of this ranking")]
    UnknownColumn(ColumnId),

    #[error("column {0} is not a composite column")]
    NotComposite(ColumnId),

    #[error("column {column} does not support {operation}")]
    Unsupported {
        column: ColumnId,
        operation: &'static str,
    },

    #[error("invalid filter for column {column}: {reason}")]
    InvalidFilter {
        column: ColumnId,
        reason: String,
    },

    #[error("expected {expected} weights, got {actual}")]
    WeightCount {
        expected: usize,
        actual: usize,
    },
}
