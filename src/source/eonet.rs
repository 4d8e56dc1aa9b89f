//! EONET (Earth Observatory Natural Event Tracker) HTTP client.
//!
//! Fetches the category catalog and, per category, the open and closed
//! events of the last `days` days. Each category yields two batches:
//! open events first, then closed events.

use crate::models::{sort_newest_first, Category, Event};
use crate::source::{CategoryCatalog, EventSource, EventStream, SourceError};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the EONET client.
#[derive(Debug, Clone)]
pub struct EonetConfig {
    /// Base API URL, e.g. `https://eonet.gsfc.nasa.gov/api/v2.1`.
    pub api_url: String,
    /// Look-back window for events.
    pub days: u32,
    /// Per-request timeout; a timed-out request fails that category's fetch.
    pub timeout_seconds: u64,
}

impl Default for EonetConfig {
    fn default() -> Self {
        Self {
            api_url: "https://eonet.gsfc.nasa.gov/api/v2.1".to_string(),
            days: 360,
            timeout_seconds: 30,
        }
    }
}

/// Event status filter understood by the events endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventStatus {
    Open,
    Closed,
}

impl EventStatus {
    fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Open => "open",
            EventStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoriesResponse {
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: u32,
    title: String,
    #[serde(default)]
    description: String,
    link: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<Event>,
}

/// Parse a categories document, sorted by name.
pub fn parse_categories(body: &str) -> Result<Vec<Category<Event>>, SourceError> {
    let response: CategoriesResponse = serde_json::from_str(body)?;
    let mut categories: Vec<Category<Event>> = response
        .categories
        .into_iter()
        .map(|entry| Category::new(entry.id, entry.title, entry.link).with_description(entry.description))
        .collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
}

/// Parse an events document, newest first.
pub fn parse_events(body: &str) -> Result<Vec<Event>, SourceError> {
    let response: EventsResponse = serde_json::from_str(body)?;
    let mut events = response.events;
    sort_newest_first(&mut events);
    Ok(events)
}

/// HTTP client for the EONET API.
#[derive(Debug, Clone)]
pub struct EonetClient {
    config: EonetConfig,
    http_client: reqwest::Client,
}

impl EonetClient {
    /// Create a new client.
    pub fn new(config: EonetConfig) -> Result<Self, SourceError> {
        info!("Initializing EONET client for {}", config.api_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("ourplanet/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &EonetConfig {
        &self.config
    }

    /// Fetch the category catalog.
    pub async fn fetch_categories(&self) -> Result<Vec<Category<Event>>, SourceError> {
        let url = format!("{}/categories", self.config.api_url.trim_end_matches('/'));
        let body = get_text(&self.http_client, &url, &[]).await?;
        let categories = parse_categories(&body)?;
        info!("Fetched {} categories", categories.len());
        Ok(categories)
    }
}

/// GET a URL and return the body, failing on non-success status.
async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, SourceError> {
    debug!("GET {} {:?}", url, query);

    let response = client.get(url).query(query).send().await?;

    if !response.status().is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    Ok(response.text().await?)
}

async fn fetch_events(
    client: reqwest::Client,
    endpoint: String,
    days: u32,
    status: EventStatus,
) -> Result<Vec<Event>, SourceError> {
    let query = [("days", days.to_string()), ("status", status.as_str().to_string())];
    let body = get_text(&client, &endpoint, &query).await?;
    let events = parse_events(&body)?;
    debug!("{} {} events from {}", events.len(), status.as_str(), endpoint);
    Ok(events)
}

impl EventSource<Event> for EonetClient {
    fn fetch_events(&self, category: &Category<Event>) -> EventStream<Event> {
        let client = self.http_client.clone();
        let endpoint = category.endpoint.clone();
        let days = self.config.days;

        futures::stream::iter([EventStatus::Open, EventStatus::Closed])
            .then(move |status| fetch_events(client.clone(), endpoint.clone(), days, status))
            .boxed()
    }
}

impl CategoryCatalog<Event> for EonetClient {
    fn categories(&self) -> BoxFuture<'_, Result<Vec<Category<Event>>, SourceError>> {
        self.fetch_categories().boxed()
    }
}
