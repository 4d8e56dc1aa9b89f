//! Event sources consumed by the aggregator.
//!
//! A source provides the category catalog and, per category, an
//! asynchronous sequence of event batches. Sources are passed to the
//! aggregator explicitly; there is no shared global client.

pub mod eonet;
pub mod fixture;

pub use eonet::{EonetClient, EonetConfig};
pub use fixture::FixtureSource;

use crate::models::Category;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while fetching the catalog or a category's events.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Batches of events for one category; ends when the fetch is complete.
pub type EventStream<E> = BoxStream<'static, Result<Vec<E>, SourceError>>;

/// Per-category event provider.
///
/// The returned stream must be lazy: no work may happen before it is
/// first polled, so the aggregator controls when a fetch starts.
pub trait EventSource<E>: Send + Sync + 'static {
    fn fetch_events(&self, category: &Category<E>) -> EventStream<E>;
}

/// Provider of the root category list.
pub trait CategoryCatalog<E>: Send + Sync {
    fn categories(&self) -> BoxFuture<'_, Result<Vec<Category<E>>, SourceError>>;
}

/// Adapts a closure into an [`EventSource`].
pub struct FnSource<F>(pub F);

impl<E, F> EventSource<E> for FnSource<F>
where
    F: Fn(&Category<E>) -> EventStream<E> + Send + Sync + 'static,
{
    fn fetch_events(&self, category: &Category<E>) -> EventStream<E> {
        (self.0)(category)
    }
}
