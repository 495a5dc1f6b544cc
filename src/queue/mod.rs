//! Durable, concurrency-bounded task queue
//!
//! [`PersistentQueue`] records every pending task in a JSON snapshot before it
//! is admitted for execution, runs at most N tasks at once through a
//! [`TaskHandler`], and removes each task exactly once after its handler
//! returns, whether it succeeded or not. On startup the snapshot is replayed
//! before anything new can be pushed.
//!
//! Admission order is the `order` assigned at push time (ascending). Entries
//! restored from a snapshot always have lower orders than anything pushed
//! after the restart, so they run first.

mod processor;
mod snapshot;


pub use snapshot::QueueEntry;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, Semaphore, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, QueueError};
use crate::types::{DrainOutcome, PushOutcome, TaskKey};
use snapshot::Loaded;

/// Executes one admitted task
///
/// Each call runs in its own spawned task. A returned error or a panic ends
/// that attempt; the entry is removed from the queue either way.
#[async_trait]
pub trait TaskHandler<T: Send + 'static>: Send + Sync {
    /// Run the task to completion
    async fn handle(&self, task: T) -> Result<(), PipelineError>;
}

/// Payload bounds required by the queue
pub trait QueuePayload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> QueuePayload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Entry waiting for a worker, ordered so the lowest `order` pops first
#[derive(Debug, Clone, PartialEq, Eq)]
struct Admission {
    order: u64,
    key: TaskKey,
}

// BinaryHeap is a max-heap: reverse on order so older entries come out first
impl Ord for Admission {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .order
            .cmp(&self.order)
            .then_with(|| other.key.cmp(&self.key))
    }
}

impl PartialOrd for Admission {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct QueueState<T> {
    /// Every entry not yet completed: waiting, held back, or running
    pending: HashMap<TaskKey, QueueEntry<T>>,
    /// Entries handed to the scheduler but not yet started
    ready: BinaryHeap<Admission>,
    /// Entries pushed while paused
    held: Vec<Admission>,
    next_sequence: u64,
    paused: bool,
    closed: bool,
}

impl<T: Serialize> QueueState<T> {
    fn sorted_entries(&self) -> Vec<&QueueEntry<T>> {
        let mut entries: Vec<_> = self.pending.values().collect();
        entries.sort_by_key(|e| e.order);
        entries
    }
}

struct QueueInner<T: QueuePayload> {
    path: PathBuf,
    state: Mutex<QueueState<T>>,
    /// Signalled whenever `ready` gains an entry
    ready_notify: Notify,
    /// One permit per worker
    workers: Arc<Semaphore>,
    size_tx: watch::Sender<usize>,
    shutdown: CancellationToken,
    handler: Arc<dyn TaskHandler<T>>,
    restored: usize,
    started: AtomicBool,
}

/// Persistent queue with a bounded worker pool
///
/// Cloning is cheap; all clones share the same queue.
pub struct PersistentQueue<T: QueuePayload> {
    inner: Arc<QueueInner<T>>,
}

impl<T: QueuePayload> Clone for PersistentQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: QueuePayload> PersistentQueue<T> {
    /// Restore the snapshot at `path` and start the admission loop
    ///
    /// Shorthand for [`load`](Self::load) followed by [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub async fn open(
        path: impl Into<PathBuf>,
        concurrency: usize,
        handler: Arc<dyn TaskHandler<T>>,
    ) -> Result<Self, QueueError> {
        let queue = Self::load(path, concurrency, handler).await?;
        queue.start();
        Ok(queue)
    }

    /// Restore the snapshot at `path` without running anything yet
    ///
    /// Restored entries are queued for admission in ascending order, so
    /// nothing pushed afterwards can overtake them. They start once
    /// [`start`](Self::start) is called; pushes made before that are recorded
    /// and wait as well. A snapshot that does not parse is renamed to
    /// `<path>.corrupt` and the queue starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::SnapshotRead`] when the snapshot exists but cannot
    /// be read at all (e.g. permissions).
    pub async fn load(
        path: impl Into<PathBuf>,
        concurrency: usize,
        handler: Arc<dyn TaskHandler<T>>,
    ) -> Result<Self, QueueError> {
        let path = path.into();
        let entries = load_snapshot(&path).await?;

        let mut state = QueueState {
            pending: HashMap::with_capacity(entries.len()),
            ready: BinaryHeap::with_capacity(entries.len()),
            held: Vec::new(),
            next_sequence: entries.last().map(|e| e.order + 1).unwrap_or(0),
            paused: false,
            closed: false,
        };
        for entry in entries {
            if state.pending.contains_key(&entry.key) {
                tracing::warn!(key = %entry.key, order = entry.order, "duplicate key in snapshot, keeping the older entry");
                continue;
            }
            state.ready.push(Admission {
                order: entry.order,
                key: entry.key.clone(),
            });
            state.pending.insert(entry.key.clone(), entry);
        }

        let restored = state.pending.len();
        if restored > 0 {
            tracing::info!(count = restored, path = %path.display(), "restored pending tasks");
        }

        let (size_tx, _) = watch::channel(state.pending.len());
        let queue = Self {
            inner: Arc::new(QueueInner {
                path,
                state: Mutex::new(state),
                ready_notify: Notify::new(),
                workers: Arc::new(Semaphore::new(concurrency.max(1))),
                size_tx,
                shutdown: CancellationToken::new(),
                handler,
                restored,
                started: AtomicBool::new(false),
            }),
        };
        if restored > 0 {
            queue.inner.ready_notify.notify_one();
        }
        Ok(queue)
    }

    /// Start the admission loop; returns false if it was already running
    pub fn start(&self) -> bool {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.start_processor();
        true
    }

    /// Record a task and hand it to the scheduler
    ///
    /// The snapshot is written before the entry is admitted. If that write
    /// fails the entry is still admitted and the outcome reports
    /// `durable: false`: it runs in this process but would be lost on a crash.
    /// While paused the entry is recorded but held back until [`resume`](Self::resume).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] after [`close`](Self::close).
    pub async fn push(&self, key: TaskKey, data: T) -> Result<PushOutcome, QueueError> {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state.pending.contains_key(&key) {
            tracing::warn!(key = %key, "task already queued");
            return Ok(PushOutcome::AlreadyQueued);
        }

        let order = state.next_sequence;
        state.next_sequence += 1;
        state.pending.insert(
            key.clone(),
            QueueEntry {
                key: key.clone(),
                data,
                order,
            },
        );

        let durable = self.persist(&state).await;
        self.inner.size_tx.send_replace(state.pending.len());

        let admission = Admission {
            order,
            key: key.clone(),
        };
        if state.paused {
            state.held.push(admission);
        } else {
            state.ready.push(admission);
            self.inner.ready_notify.notify_one();
        }

        tracing::info!(key = %key, order, durable, "task queued");
        Ok(PushOutcome::Queued { order, durable })
    }

    /// Remove a finished task and persist the shrunken snapshot
    ///
    /// Called by the scheduler once per admitted task. Unknown keys are ignored.
    pub(crate) async fn complete(&self, key: &TaskKey) {
        let mut state = self.inner.state.lock().await;
        if state.pending.remove(key).is_none() {
            return;
        }
        self.persist(&state).await;
        self.inner.size_tx.send_replace(state.pending.len());
        tracing::debug!(key = %key, remaining = state.pending.len(), "task removed from queue");
    }

    /// Entries not yet completed (waiting plus running)
    pub fn size(&self) -> usize {
        *self.inner.size_tx.borrow()
    }

    /// Whether `key` is currently pending
    pub async fn contains(&self, key: &TaskKey) -> bool {
        self.inner.state.lock().await.pending.contains_key(key)
    }

    /// Number of entries recovered from the snapshot at open
    pub fn restored_count(&self) -> usize {
        self.inner.restored
    }

    /// Snapshot file path
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Stop handing new pushes to the scheduler
    ///
    /// Entries already admitted keep running. New pushes are still recorded.
    pub async fn pause(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.paused {
            state.paused = true;
            tracing::info!("queue paused");
        }
    }

    /// Admit everything held back while paused
    pub async fn resume(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.paused {
            return;
        }
        state.paused = false;
        let held = std::mem::take(&mut state.held);
        let released = held.len();
        state.ready.extend(held);
        if released > 0 {
            self.inner.ready_notify.notify_one();
        }
        tracing::info!(released, "queue resumed");
    }

    /// Whether the queue is paused
    pub async fn is_paused(&self) -> bool {
        self.inner.state.lock().await.paused
    }

    /// Wait until no entries are pending or `timeout` elapses
    pub async fn drain(&self, timeout: Duration) -> DrainOutcome {
        let mut size_rx = self.inner.size_tx.subscribe();
        let idle = tokio::time::timeout(timeout, size_rx.wait_for(|n| *n == 0))
            .await
            .is_ok();
        if idle {
            DrainOutcome::Idle
        } else {
            DrainOutcome::TimedOut {
                remaining: self.size(),
            }
        }
    }

    /// Stop the admission loop and reject further pushes
    ///
    /// Running handlers are not interrupted; they still complete their entries.
    /// Entries that never started stay in the snapshot for the next start.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        self.inner.shutdown.cancel();
        tracing::info!(pending = state.pending.len(), "queue closed");
    }

    /// Write the snapshot; returns whether the write succeeded
    async fn persist(&self, state: &QueueState<T>) -> bool {
        match snapshot::write(&self.inner.path, &state.sorted_entries()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    path = %self.inner.path.display(),
                    error = %e,
                    "failed to persist queue snapshot, in-memory queue now diverges from disk"
                );
                false
            }
        }
    }
}

async fn load_snapshot<T: QueuePayload>(path: &Path) -> Result<Vec<QueueEntry<T>>, QueueError> {
    match snapshot::read::<T>(path).await? {
        Loaded::Missing => Ok(Vec::new()),
        Loaded::Entries(entries) => Ok(entries),
        Loaded::Corrupt(reason) => {
            match snapshot::quarantine(path).await {
                Ok(backup) => tracing::error!(
                    path = %path.display(),
                    backup = %backup.display(),
                    reason = %reason,
                    "queue snapshot unreadable, starting empty"
                ),
                Err(e) => tracing::error!(
                    path = %path.display(),
                    reason = %reason,
                    error = %e,
                    "queue snapshot unreadable and could not be moved aside, starting empty"
                ),
            }
            Ok(Vec::new())
        }
    }
}
