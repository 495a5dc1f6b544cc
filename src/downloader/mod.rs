//! Core downloader implementation
//!
//! [`MediaDownloader`] ties the persistent queue to the download pipeline and
//! publishes lifecycle [`Event`]s. Its methods are split across focused
//! submodules:
//! - [`lifecycle`] - graceful shutdown
//! - [`notifications`] - fire-and-forget indicators and library refresh
//! - [`download_task`] - the per-task pipeline

mod download_task;
mod lifecycle;
pub(crate) mod notifications;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::heartbeat::ConnectionHeartbeat;
use crate::queue::PersistentQueue;
use crate::services::{SessionConnection, Services};
use crate::types::{DownloadTask, Event, PushOutcome};
use download_task::DownloadPipeline;

/// Capacity of the event channel; slower subscribers see `RecvError::Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Durable queue feeding the pipeline
    pub(crate) queue: PersistentQueue<DownloadTask>,
    /// Cancelled on shutdown to stop background loops
    pub(crate) shutdown_token: CancellationToken,
    /// Set by the first `start_queue_processor` call
    processor_started: Arc<AtomicBool>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader
    ///
    /// Validates the configuration, creates the media root, then restores the
    /// persistent queue. Nothing runs until
    /// [`start_queue_processor`](Self::start_queue_processor) is called, so
    /// subscribers attached in between see every event of restored tasks.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, when the media root cannot be created,
    /// or when an existing queue snapshot cannot be read.
    pub async fn new(config: Config, services: Services) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(config.media_root()).await?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let config = Arc::new(config);

        let pipeline = Arc::new(DownloadPipeline::new(
            Arc::clone(&config),
            services,
            event_tx.clone(),
        ));
        let queue = PersistentQueue::<DownloadTask>::load(
            config.queue_path().clone(),
            config.download.max_concurrent_downloads,
            pipeline,
        )
        .await?;

        tracing::info!(
            media_root = %config.media_root().display(),
            queue_path = %config.queue_path().display(),
            concurrency = config.download.max_concurrent_downloads,
            restored = queue.restored_count(),
            "downloader created"
        );

        Ok(Self {
            config,
            event_tx,
            queue,
            shutdown_token: CancellationToken::new(),
            processor_started: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start running queued tasks
    ///
    /// Publishes [`Event::Restored`] for tasks recovered from the snapshot,
    /// then starts the admission loop. Tasks enqueued before this call wait
    /// until it is made. Calling it again has no effect.
    pub fn start_queue_processor(&self) {
        if self.processor_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let restored = self.queue.restored_count();
        if restored > 0 {
            self.emit_event(Event::Restored { count: restored });
        }
        self.queue.start();
        tracing::info!(restored, "queue processor started");
    }

    /// Queue a task for download
    ///
    /// Returns [`PushOutcome::AlreadyQueued`] when a task with the same key is
    /// still pending; the existing task is left untouched.
    ///
    /// # Errors
    ///
    /// Fails only after [`shutdown`](Self::shutdown) has closed the queue.
    pub async fn enqueue(&self, task: DownloadTask) -> Result<PushOutcome> {
        let key = task.key();
        let outcome = self.queue.push(key.clone(), task).await?;
        match outcome {
            PushOutcome::Queued { order, .. } => self.emit_event(Event::Queued { key, order }),
            PushOutcome::AlreadyQueued => self.emit_event(Event::AlreadyQueued { key }),
        }
        Ok(outcome)
    }

    /// Tasks not yet completed (waiting plus running)
    pub fn pending(&self) -> usize {
        self.queue.size()
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events, it will receive a
    /// `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(downloader: telly_dl::MediaDownloader) {
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         println!("{event:?}");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Stop starting newly queued tasks (they are still recorded)
    pub async fn pause(&self) {
        self.queue.pause().await;
    }

    /// Start tasks queued while paused
    pub async fn resume(&self) {
        self.queue.resume().await;
    }

    /// Keep `session` connected until shutdown
    ///
    /// Runs a [`ConnectionHeartbeat`] at the configured interval; the loop stops
    /// when [`shutdown`](Self::shutdown) is called.
    pub fn spawn_heartbeat(
        &self,
        session: Arc<dyn SessionConnection>,
    ) -> tokio::task::JoinHandle<()> {
        ConnectionHeartbeat::new(session, self.config.runtime.heartbeat_interval)
            .spawn(self.shutdown_token.child_token())
    }

    /// Emit an event to all subscribers
    ///
    /// Sending only fails when nobody is subscribed, which is fine.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
