//! Shutdown coordination.

use crate::error::Result;
use crate::types::{DrainOutcome, Event};

use super::MediaDownloader;

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Pauses the queue so newly pushed tasks are recorded but not started
    /// 2. Waits for running and already-admitted tasks, up to `shutdown_timeout`
    /// 3. Closes the queue and stops background loops such as the heartbeat
    ///
    /// Tasks still running when the timeout expires are abandoned, not
    /// cancelled. Anything that never reached completion stays in the snapshot
    /// and is retried on the next start.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.queue.pause().await;

        let timeout = self.config.runtime.shutdown_timeout;
        match self.queue.drain(timeout).await {
            DrainOutcome::Idle => {
                tracing::info!("All queued downloads finished");
            }
            DrainOutcome::TimedOut { remaining } => {
                tracing::warn!(
                    remaining,
                    timeout_secs = timeout.as_secs(),
                    "Timeout waiting for downloads to finish, proceeding with shutdown"
                );
            }
        }

        self.queue.close().await;
        self.shutdown_token.cancel();

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
