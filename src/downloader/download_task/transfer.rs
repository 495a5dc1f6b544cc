//! Streaming with a stall watchdog

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::context::ProgressTracker;
use crate::config::WatchdogConfig;
use crate::error::PipelineError;
use crate::services::SourceConnector;
use crate::types::{ContentHandle, TaskKey};

/// Stream `handle` into `dest`, aborting if no chunk arrives for `stall_timeout`
///
/// `on_percent` is called with `(bytes_done, bytes_total, percent)` whenever
/// the whole percentage changes. The watchdog lives exactly as long as this
/// call: it is stopped through a drop guard however the transfer ends.
pub(super) async fn stream_with_watchdog(
    key: &TaskKey,
    connector: &Arc<dyn SourceConnector>,
    handle: &ContentHandle,
    dest: &Path,
    watchdog: &WatchdogConfig,
    on_percent: &(dyn Fn(u64, u64, u8) + Send + Sync),
) -> Result<u64, PipelineError> {
    let tracker = Arc::new(ProgressTracker::new());
    let stalled = CancellationToken::new();
    let stop = CancellationToken::new();
    let _stop_watchdog = stop.clone().drop_guard();

    spawn_stall_watchdog(StallWatchdog {
        key: key.clone(),
        tracker: Arc::clone(&tracker),
        connector: Arc::clone(connector),
        poll_interval: watchdog.poll_interval,
        stall_timeout: watchdog.stall_timeout,
        stalled: stalled.clone(),
        stop,
    });

    let progress = |done: u64, total: u64| {
        if let Some(percent) = tracker.record(done, total) {
            on_percent(done, total, percent);
        }
    };

    tokio::select! {
        biased;
        _ = stalled.cancelled() => Err(PipelineError::TransferStalled { idle: tracker.idle() }),
        result = connector.stream(handle, dest, &progress) => match result {
            Ok(written) => Ok(written),
            // the watchdog reset the connection under us
            Err(_) if stalled.is_cancelled() => Err(PipelineError::TransferStalled { idle: tracker.idle() }),
            Err(e) => Err(PipelineError::TransferFailed {
                reason: format!("{} after {} bytes", e, tracker.bytes_done()),
            }),
        },
    }
}

struct StallWatchdog {
    key: TaskKey,
    tracker: Arc<ProgressTracker>,
    connector: Arc<dyn SourceConnector>,
    poll_interval: Duration,
    stall_timeout: Duration,
    stalled: CancellationToken,
    stop: CancellationToken,
}

/// Poll the tracker every `poll_interval`; on a stall, abort the transfer and reset the connection
fn spawn_stall_watchdog(params: StallWatchdog) {
    let StallWatchdog {
        key,
        tracker,
        connector,
        poll_interval,
        stall_timeout,
        stalled,
        stop,
    } = params;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = interval.tick() => {
                    let idle = tracker.idle();
                    if idle <= stall_timeout {
                        continue;
                    }
                    tracing::warn!(
                        key = %key,
                        idle_secs = idle.as_secs(),
                        bytes_done = tracker.bytes_done(),
                        "transfer stalled, resetting connection"
                    );
                    stalled.cancel();
                    if let Err(e) = connector.reset().await {
                        tracing::warn!(key = %key, error = %e, "failed to reset stalled connection");
                    }
                    break;
                }
            }
        }
    });
}
