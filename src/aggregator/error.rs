//! Errors raised when an aggregation cannot start.

use crate::source::SourceError;
use thiserror::Error;

/// Construction-time misuse of the aggregator.
///
/// Fetch failures never show up here: they are absorbed into the
/// snapshots and reported in the completion.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("category catalog is empty")]
    EmptyCatalog,

    #[error("max concurrent fetches must be at least 1 (got {0})")]
    InvalidConcurrency(usize),

    #[error("failed to load category catalog: {0}")]
    Catalog(#[from] SourceError),
}
