//! The aggregation driver and its consumer handle.
//!
//! [`Aggregator::spawn`] starts a single tokio task that owns the running
//! category list. Fetch streams are multiplexed inside that task, so
//! batches are folded one at a time and every emission leaves through one
//! serialized path.

use crate::aggregator::error::AggregateError;
use crate::aggregator::merge::merge_batch;
use crate::models::{Category, CategoryId, Completion, Progress, Snapshot};
use crate::source::{EventSource, EventStream, SourceError};
use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Emissions buffered for [`Aggregation::next`] before the driver waits.
pub const EMISSION_BUFFER: usize = 32;

/// A value published by a running aggregation.
#[derive(Debug, Clone)]
pub enum Emission<E> {
    /// The category list after the latest batch (the first one is empty).
    Snapshot(Arc<Snapshot<E>>),
    /// Emitted once per finished fetch.
    Progress(Progress),
    /// Every fetch has finished. Always the last emission.
    Completed(Completion<E>),
}

/// What a single fetch stream yields to the driver.
enum FetchItem<E> {
    Batch { index: usize, events: Vec<E> },
    Failed { index: usize, error: SourceError },
    Done { index: usize },
}

/// A validated category list ready to be aggregated.
#[derive(Debug, Clone)]
pub struct Aggregator<E> {
    categories: Vec<Category<E>>,
    max_concurrent: usize,
}

impl<E> Aggregator<E>
where
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// Validate the inputs. Category ids are expected to be unique.
    pub fn new(categories: Vec<Category<E>>, max_concurrent: usize) -> Result<Self, AggregateError> {
        if categories.is_empty() {
            return Err(AggregateError::EmptyCatalog);
        }
        if max_concurrent == 0 {
            return Err(AggregateError::InvalidConcurrency(max_concurrent));
        }

        Ok(Self {
            categories,
            max_concurrent,
        })
    }

    /// Number of fetches the aggregation will run.
    pub fn total(&self) -> usize {
        self.categories.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Start the aggregation on the current tokio runtime.
    ///
    /// The initial snapshot is queued before this returns, so the first
    /// emission a consumer sees is always the full category list with no
    /// events. At most [`EMISSION_BUFFER`] emissions wait in the queue; past
    /// that the driver waits for [`Aggregation::next`], unless the queue was
    /// closed with [`Aggregation::close_emissions`].
    pub fn spawn<S, M>(self, source: S, matches: M) -> Aggregation<E>
    where
        S: EventSource<E>,
        M: Fn(&E, &Category<E>) -> bool + Send + Sync + 'static,
    {
        let categories: Vec<Category<E>> = self
            .categories
            .into_iter()
            .map(|mut category| {
                category.events.clear();
                category
            })
            .collect();
        let total = categories.len();
        let initial = Arc::new(Snapshot::new(categories));

        let (emissions_tx, emissions_rx) = mpsc::channel(EMISSION_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::clone(&initial));
        let (progress_tx, progress_rx) = watch::channel(Progress::new(0, total));
        let cancelled = Arc::new(Mutex::new(false));

        let emitter = Emitter {
            emissions: emissions_tx,
            snapshot: snapshot_tx,
            progress: progress_tx,
            cancelled: Arc::clone(&cancelled),
        };
        // A fresh channel always has room for the first emission.
        let _ = emitter
            .emissions
            .try_send(Emission::Snapshot(Arc::clone(&initial)));

        let driver = Driver {
            source,
            matches,
            max_concurrent: self.max_concurrent,
            current: initial,
            emitter,
        };
        let task = tokio::spawn(driver.run());

        Aggregation {
            emissions: Some(emissions_rx),
            snapshots: snapshot_rx,
            progress: progress_rx,
            cancelled,
            task,
        }
    }
}

/// The single emission path of a running aggregation.
///
/// Room in the queue is reserved first, then every send happens under the
/// `cancelled` lock, so once the handle has flipped the flag no further
/// value can reach any receiver.
struct Emitter<E> {
    emissions: mpsc::Sender<Emission<E>>,
    snapshot: watch::Sender<Arc<Snapshot<E>>>,
    progress: watch::Sender<Progress>,
    cancelled: Arc<Mutex<bool>>,
}

impl<E> Emitter<E> {
    /// Publish an emission. Returns `false` once the aggregation is cancelled.
    async fn emit(&self, emission: Emission<E>) -> bool {
        // A closed queue leaves only the latest-value views to update.
        let permit = self.emissions.reserve().await.ok();

        let cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        if *cancelled {
            return false;
        }

        match &emission {
            Emission::Snapshot(snapshot) => {
                self.snapshot.send_replace(Arc::clone(snapshot));
            }
            Emission::Progress(progress) => {
                self.progress.send_replace(*progress);
            }
            Emission::Completed(_) => {}
        }

        if let Some(permit) = permit {
            permit.send(emission);
        }
        true
    }
}

struct Driver<E, S, M> {
    source: S,
    matches: M,
    max_concurrent: usize,
    current: Arc<Snapshot<E>>,
    emitter: Emitter<E>,
}

impl<E, S, M> Driver<E, S, M>
where
    E: Clone + PartialEq + Send + Sync + 'static,
    S: EventSource<E>,
    M: Fn(&E, &Category<E>) -> bool + Send + Sync + 'static,
{
    async fn run(mut self) {
        let ids: Vec<CategoryId> = self.current.categories.iter().map(|c| c.id).collect();
        let total = ids.len();

        let mut queue: VecDeque<usize> = (0..total).collect();
        let mut active: SelectAll<BoxStream<'static, FetchItem<E>>> = SelectAll::new();
        let mut in_flight = 0usize;
        let mut completed = 0usize;
        let mut failed: Vec<CategoryId> = Vec::new();

        info!(
            "Aggregating {} categories with at most {} fetches in flight",
            total, self.max_concurrent
        );

        self.fill(&mut queue, &mut active, &mut in_flight);

        while let Some(item) = active.next().await {
            match item {
                FetchItem::Batch { index, events } => {
                    let before = self.current.event_count();
                    let categories = merge_batch(&self.current.categories, &events, &self.matches);
                    let snapshot = Arc::new(Snapshot::new(categories));
                    debug!(
                        "Batch of {} events from category {} added {} memberships",
                        events.len(),
                        ids[index],
                        snapshot.event_count() - before
                    );

                    self.current = Arc::clone(&snapshot);
                    if !self.emitter.emit(Emission::Snapshot(snapshot)).await {
                        return;
                    }
                }
                FetchItem::Failed { index, error } => {
                    warn!("Fetch for category {} failed: {}", ids[index], error);
                    failed.push(ids[index]);
                }
                FetchItem::Done { index } => {
                    in_flight -= 1;
                    completed += 1;
                    debug!("Fetch for category {} finished", ids[index]);

                    self.fill(&mut queue, &mut active, &mut in_flight);

                    if !self
                        .emitter
                        .emit(Emission::Progress(Progress::new(completed, total)))
                        .await
                    {
                        return;
                    }
                }
            }
        }

        info!(
            "Aggregation complete: {} events across {} categories, {} failed",
            self.current.event_count(),
            total,
            failed.len()
        );

        self.emitter
            .emit(Emission::Completed(Completion {
                snapshot: self.current,
                failed,
            }))
            .await;
    }

    /// Launch queued fetches, in category order, until the bound is reached.
    fn fill(
        &self,
        queue: &mut VecDeque<usize>,
        active: &mut SelectAll<BoxStream<'static, FetchItem<E>>>,
        in_flight: &mut usize,
    ) {
        while *in_flight < self.max_concurrent {
            let Some(index) = queue.pop_front() else {
                break;
            };
            active.push(self.launch(index));
            *in_flight += 1;
        }
    }

    /// Wrap one category's fetch: batches until the first error, then `Done`.
    fn launch(&self, index: usize) -> BoxStream<'static, FetchItem<E>> {
        let category = &self.current.categories[index];
        debug!("Starting fetch for {} ({})", category.name, category.id);

        let upstream = self.source.fetch_events(category);
        let batches = stream::unfold(Some(upstream), move |state: Option<EventStream<E>>| async move {
            let Some(mut upstream) = state else {
                return None;
            };
            match upstream.next().await {
                Some(Ok(events)) => Some((FetchItem::Batch { index, events }, Some(upstream))),
                Some(Err(error)) => Some((FetchItem::Failed { index, error }, None)),
                None => None,
            }
        });

        batches
            .chain(stream::once(async move { FetchItem::Done { index } }))
            .boxed()
    }
}

/// Consumer handle of a running aggregation.
///
/// Dropping the handle cancels the aggregation.
pub struct Aggregation<E> {
    emissions: Option<mpsc::Receiver<Emission<E>>>,
    snapshots: watch::Receiver<Arc<Snapshot<E>>>,
    progress: watch::Receiver<Progress>,
    cancelled: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl<E> Aggregation<E> {
    /// Next emission, in publication order. `None` after `Completed` or
    /// once the queue is closed.
    pub async fn next(&mut self) -> Option<Emission<E>> {
        match self.emissions.as_mut() {
            Some(emissions) => emissions.recv().await,
            None => None,
        }
    }

    /// Stop queueing emissions and discard the buffered ones.
    ///
    /// For consumers that only read [`snapshots`](Self::snapshots) and
    /// [`progress`](Self::progress): the aggregation keeps running and the
    /// views stay current without anyone calling [`next`](Self::next).
    pub fn close_emissions(&mut self) {
        self.emissions = None;
    }

    /// Wait for the completion signal, skipping intermediate emissions.
    pub async fn completed(&mut self) -> Option<Completion<E>> {
        while let Some(emission) = self.next().await {
            if let Emission::Completed(completion) = emission {
                return Some(completion);
            }
        }
        None
    }

    /// Latest-value view of the snapshots.
    pub fn snapshots(&self) -> watch::Receiver<Arc<Snapshot<E>>> {
        self.snapshots.clone()
    }

    /// Latest-value view of the progress.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    pub fn latest_snapshot(&self) -> Arc<Snapshot<E>> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn latest_progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Whether the driver task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the aggregation. Nothing is emitted once this returns and all
    /// queued and in-flight fetches are dropped.
    pub fn cancel(self) {
        debug!("Cancelling aggregation");
        drop(self);
    }

    fn shutdown(&mut self) {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.task.abort();
    }
}

impl<E> Drop for Aggregation<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
