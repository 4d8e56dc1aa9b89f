//! Bounded fan-out aggregation.
//!
//! One fetch per category, at most `max_concurrent` in flight, every
//! incoming batch folded into a fresh immutable snapshot on a single
//! driver task.

pub mod error;
pub mod merge;
pub mod pipeline;

pub use error::AggregateError;
pub use merge::merge_batch;
pub use pipeline::{Aggregation, Aggregator, Emission, EMISSION_BUFFER};

use crate::models::Category;
use crate::source::{CategoryCatalog, EventSource};
use tracing::info;

/// Load the catalog and start aggregating over it.
pub async fn aggregate<E, C, S, M>(
    catalog: &C,
    source: S,
    max_concurrent: usize,
    matches: M,
) -> Result<Aggregation<E>, AggregateError>
where
    E: Clone + PartialEq + Send + Sync + 'static,
    C: CategoryCatalog<E> + ?Sized,
    S: EventSource<E>,
    M: Fn(&E, &Category<E>) -> bool + Send + Sync + 'static,
{
    let categories = catalog.categories().await?;
    info!("Catalog has {} categories", categories.len());

    let aggregator = Aggregator::new(categories, max_concurrent)?;
    Ok(aggregator.spawn(source, matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{event_in_category, Event, Snapshot};
    use crate::source::FixtureSource;
    use std::path::PathBuf;

    fn recorded() -> FixtureSource {
        FixtureSource::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/eonet"))
    }

    fn sorted_ids(snapshot: &Snapshot<Event>, name: &str) -> Vec<String> {
        let mut ids: Vec<String> = snapshot
            .categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.events.iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_aggregate_recorded_catalog() {
        let source = recorded();
        let mut aggregation = aggregate(&source, source.clone(), 2, event_in_category)
            .await
            .unwrap();

        let completion = aggregation.completed().await.unwrap();
        let snapshot = &completion.snapshot;

        let names: Vec<_> = snapshot.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Drought", "Severe Storms", "Volcanoes", "Wildfires"]);

        // Drought has no recorded events file.
        assert_eq!(completion.failed, vec![6]);
        assert!(sorted_ids(snapshot, "Drought").is_empty());

        assert_eq!(sorted_ids(snapshot, "Wildfires"), vec!["EONET_4285", "EONET_4301"]);
        assert_eq!(sorted_ids(snapshot, "Severe Storms"), vec!["EONET_4296", "EONET_4301"]);
        assert_eq!(sorted_ids(snapshot, "Volcanoes"), vec!["EONET_4280"]);
        assert_eq!(snapshot.distinct_events(), 4);
        assert_eq!(aggregation.latest_progress().ratio(), 1.0);
    }

    #[tokio::test]
    async fn test_aggregate_missing_catalog() {
        let source = FixtureSource::new("/definitely/not/here");
        let result = aggregate(&source, source.clone(), 2, event_in_category).await;
        assert!(matches!(result, Err(AggregateError::Catalog(_))));
    }
}
