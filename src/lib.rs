//! OurPlanet - bounded fan-out aggregation of natural events.
//!
//! The core is [`aggregator`]: given a category catalog and an event
//! source, it fetches every category's events with a bounded number of
//! fetches in flight and publishes immutable snapshots, progress and a
//! completion signal. [`source`] provides the EONET HTTP client and an
//! offline fixture source; [`report`] renders finished runs.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod models;
pub mod report;
pub mod source;

pub use aggregator::{aggregate, AggregateError, Aggregation, Aggregator, Emission};
pub use models::{Category, CategoryId, Completion, Event, Progress, Snapshot};
pub use source::{CategoryCatalog, EventSource, EventStream, FnSource, SourceError};
