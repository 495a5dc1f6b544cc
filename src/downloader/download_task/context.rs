//! Pipeline context and per-execution transfer state

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::Config;
use crate::downloader::notifications::Notifier;
use crate::error::PipelineError;
use crate::queue::TaskHandler;
use crate::services::Services;
use crate::types::{DownloadTask, Event};

/// The download pipeline, run once per admitted task
pub(crate) struct DownloadPipeline {
    pub(crate) config: Arc<Config>,
    pub(crate) services: Services,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) notifier: Notifier,
}

impl DownloadPipeline {
    pub(crate) fn new(
        config: Arc<Config>,
        services: Services,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let notifier = Notifier::new(&services, event_tx.clone());
        Self {
            config,
            services,
            event_tx,
            notifier,
        }
    }

    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

#[async_trait]
impl TaskHandler<DownloadTask> for DownloadPipeline {
    async fn handle(&self, task: DownloadTask) -> Result<(), PipelineError> {
        super::orchestration::run_download_task(self, task).await
    }
}

/// Destination of one execution: where bytes land and where they end up
///
/// Dropping it removes the temp file if one is still there, which covers a
/// task torn down by a panicking collaborator mid-transfer.
#[derive(Debug)]
pub(super) struct StagedPaths {
    pub(super) final_path: PathBuf,
    pub(super) temp_path: PathBuf,
}

impl Drop for StagedPaths {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => tracing::warn!(path = %self.temp_path.display(), "removed abandoned partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.temp_path.display(),
                error = %e,
                "failed to remove abandoned partial file"
            ),
        }
    }
}

/// Progress of one transfer, shared between the progress callback and the watchdog
///
/// Times are monotonic milliseconds since the transfer started.
pub(super) struct ProgressTracker {
    origin: Instant,
    last_progress_ms: AtomicU64,
    bytes_done: AtomicU64,
    last_percent: AtomicU8,
}

impl ProgressTracker {
    pub(super) fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_progress_ms: AtomicU64::new(0),
            bytes_done: AtomicU64::new(0),
            last_percent: AtomicU8::new(u8::MAX),
        }
    }

    /// Record a chunk; returns the new whole percentage when it changed
    pub(super) fn record(&self, bytes_done: u64, bytes_total: u64) -> Option<u8> {
        let now_ms = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_progress_ms.store(now_ms, Ordering::Release);
        self.bytes_done.store(bytes_done, Ordering::Relaxed);

        if bytes_total == 0 {
            return None;
        }
        let percent = (u128::from(bytes_done.min(bytes_total)) * 100 / u128::from(bytes_total)) as u8;
        let previous = self.last_percent.swap(percent, Ordering::AcqRel);
        (previous != percent).then_some(percent)
    }

    /// Time since the last recorded chunk (or since the transfer started)
    pub(super) fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_progress_ms.load(Ordering::Acquire));
        self.origin.elapsed().saturating_sub(last)
    }

    pub(super) fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }
}
