//! Offline event source backed by a directory of EONET documents.
//!
//! Layout:
//!
//! ```text
//! <dir>/categories.json     EONET categories document
//! <dir>/events/<id>.json    EONET events document for category <id>
//! ```
//!
//! A category whose events file is missing or unreadable fails its fetch.

use crate::models::{Category, Event};
use crate::source::eonet::{parse_categories, parse_events};
use crate::source::{CategoryCatalog, EventSource, EventStream, SourceError};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Event source reading pre-recorded EONET responses from disk.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    root: PathBuf,
}

impl FixtureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn events_path(&self, category: &Category<Event>) -> PathBuf {
        self.root.join("events").join(format!("{}.json", category.id))
    }
}

async fn read_file(path: PathBuf) -> Result<String, SourceError> {
    debug!("Reading fixture {}", path.display());
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| SourceError::Io { path, source })
}

impl CategoryCatalog<Event> for FixtureSource {
    fn categories(&self) -> BoxFuture<'_, Result<Vec<Category<Event>>, SourceError>> {
        let path = self.root.join("categories.json");
        async move {
            let body = read_file(path).await?;
            parse_categories(&body)
        }
        .boxed()
    }
}

impl EventSource<Event> for FixtureSource {
    fn fetch_events(&self, category: &Category<Event>) -> EventStream<Event> {
        let path = self.events_path(category);
        futures::stream::once(async move {
            let body = read_file(path).await?;
            parse_events(&body)
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixtures(dir: &Path) {
        fs::write(
            dir.join("categories.json"),
            r#"{"categories": [
                {"id": 8, "title": "Wildfires", "link": "events/8"},
                {"id": 6, "title": "Drought", "link": "events/6"}
            ]}"#,
        )
        .unwrap();
        fs::create_dir(dir.join("events")).unwrap();
        fs::write(
            dir.join("events").join("8.json"),
            r#"{"events": [
                {"id": "F1", "title": "Fire", "categories": [{"id": 8, "title": "Wildfires"}],
                 "geometries": [{"date": "2019-07-01T00:00:00Z", "type": "Point", "coordinates": [1, 2]}]}
            ]}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_fixture_catalog() {
        let dir = TempDir::new().unwrap();
        write_fixtures(dir.path());

        let source = FixtureSource::new(dir.path());
        assert_eq!(source.root(), dir.path());
        tokio_test::assert_ok!(source.categories().await);
        let categories = source.categories().await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Drought");
    }

    #[tokio::test]
    async fn test_fixture_events_and_missing_file() {
        let dir = TempDir::new().unwrap();
        write_fixtures(dir.path());

        let source = FixtureSource::new(dir.path());
        let categories = source.categories().await.unwrap();

        let drought = &categories[0];
        let wildfires = &categories[1];

        let batches: Vec<_> = source.fetch_events(wildfires).collect().await;
        assert_eq!(batches.len(), 1);
        let events = batches.into_iter().next().unwrap().unwrap();
        assert_eq!(events[0].id, "F1");

        let mut missing = source.fetch_events(drought);
        let result = missing.next().await.unwrap();
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }

    #[tokio::test]
    async fn test_missing_catalog() {
        let dir = TempDir::new().unwrap();
        let source = FixtureSource::new(dir.path());
        tokio_test::assert_err!(source.categories().await);
    }
}
