//! Data models for the event aggregator.
//!
//! This module contains the core data structures shared by the aggregator,
//! the event sources and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Identifier of a category in the catalog.
pub type CategoryId = u32;

/// A named grouping of events with its own fetch endpoint.
///
/// The event payload `E` is opaque to the aggregator; the CLI uses
/// [`Event`], tests use small stand-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category<E> {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Where the event source fetches this category's events from.
    pub endpoint: String,
    /// Events matched so far, in arrival order.
    #[serde(default = "Vec::new")]
    pub events: Vec<E>,
}

impl<E> Category<E> {
    /// Create a category with no events yet.
    pub fn new(id: CategoryId, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            endpoint: endpoint.into(),
            events: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Immutable point-in-time view of every category and its events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<E> {
    pub categories: Vec<Category<E>>,
}

impl<E> Snapshot<E> {
    pub fn new(categories: Vec<Category<E>>) -> Self {
        Self { categories }
    }

    /// Look up a category by id.
    pub fn category(&self, id: CategoryId) -> Option<&Category<E>> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Total number of (category, event) memberships in this snapshot.
    pub fn event_count(&self) -> usize {
        self.categories.iter().map(|c| c.events.len()).sum()
    }
}

impl Snapshot<Event> {
    /// Number of distinct events; an event in several categories counts once.
    pub fn distinct_events(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.events.iter().map(|e| e.id.as_str()))
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Fraction of per-category fetches that have finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Completion ratio in `[0.0, 1.0]`; exactly `1.0` once every fetch is done.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%)",
            self.completed,
            self.total,
            self.ratio() * 100.0
        )
    }
}

/// Final result of an aggregation run.
#[derive(Debug, Clone)]
pub struct Completion<E> {
    pub snapshot: Arc<Snapshot<E>>,
    /// Categories whose fetch failed; they keep whatever arrived before the failure.
    pub failed: Vec<CategoryId>,
}

/// Reference from an event to one of the categories it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub title: String,
}

/// A dated geometry attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: serde_json::Value,
}

/// A natural event as published by EONET.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: Option<String>,
    /// Set when the event is over.
    #[serde(default)]
    pub closed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub geometries: Vec<Geometry>,
}

// Events are identified by their EONET id.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Event {
    /// Most recent geometry date, if any.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.geometries.iter().map(|g| g.date).max()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Whether the event lists the given category among its own.
    pub fn belongs_to(&self, id: CategoryId) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}

/// Match predicate for EONET events: the event names the category.
pub fn event_in_category(event: &Event, category: &Category<Event>) -> bool {
    event.belongs_to(category.id)
}

/// Sort events newest first; undated events go last.
pub fn sort_newest_first(events: &mut [Event]) {
    events.sort_by(|a, b| b.date().cmp(&a.date()));
}

/// Per-category summary line in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
    pub event_count: usize,
    pub open_count: usize,
    pub closed_count: usize,
    pub fetch_failed: bool,
}

/// Metadata about an aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// API URL or fixture directory the events came from.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub days: u32,
    pub max_concurrent: usize,
    pub categories_fetched: usize,
    pub categories_failed: usize,
    /// Distinct events across all categories.
    pub total_events: usize,
    pub duration_seconds: f64,
}

/// Complete report of an aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: Vec<CategorySummary>,
    pub categories: Vec<Category<Event>>,
}

impl Report {
    /// Build a report from the final completion of an aggregation.
    pub fn from_completion(completion: &Completion<Event>, metadata: ReportMetadata) -> Self {
        let categories = completion.snapshot.categories.clone();
        let summary = categories
            .iter()
            .map(|c| {
                let closed_count = c.events.iter().filter(|e| e.is_closed()).count();
                CategorySummary {
                    id: c.id,
                    name: c.name.clone(),
                    event_count: c.events.len(),
                    open_count: c.events.len() - closed_count,
                    closed_count,
                    fetch_failed: completion.failed.contains(&c.id),
                }
            })
            .collect();

        Self {
            metadata,
            summary,
            categories,
        }
    }
}
