//! Data providers for the ranking engine
//!
//! A provider owns the rankings, the column registry and the row selection,
//! and turns a ranking's sort criteria into a row order, either over rows held
//! in memory or by delegating to a remote service.

pub mod builder;
pub mod column_set;
pub mod config;
pub mod local;
pub mod provider;
pub mod remote;
pub mod selection;
pub mod sequencing;
pub mod sources;

use lu_core::{ModelError, RankingId};
use thiserror::Error;

// Re-exports
pub use builder::{CategoricalDescBuilder, NumberDescBuilder};
pub use column_set::ColumnSet;
pub use config::{MissingConfig, ProviderConfig};
pub use local::LocalDataProvider;
pub use provider::{DataProvider, ProviderCore, ViewRow};
pub use remote::{RemoteDataProvider, RemoteService};
pub use selection::Selection;
pub use sequencing::{SortSequencer, SortTicket};
pub use sources::CsvSource;

/// Errors that can occur in provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),

    #[error("unknown ranking {0}")]
    UnknownRanking(RankingId),

    #[error("sort of ranking {0} was superseded by a newer request")]
    Superseded(RankingId),

    #[error("row {0} does not exist")]
    InvalidRow(usize),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("remote view returned {received} rows for {requested} indices")]
    ViewMismatch { requested: usize, received: usize },

    #[error("remote service error: {0}")]
    Remote(#[source] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),
}

impl From<csv::Error> for ProviderError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => {
                ProviderError::Io(std::io::Error::new(io_err.kind(), error.to_string()))
            }
            _ => ProviderError::Csv(error.to_string()),
        }
    }
}

impl ProviderError {
    /// Whether the error only means a newer sort took over
    pub fn is_superseded(&self) -> bool {
        matches!(self, ProviderError::Superseded(_))
    }
}
