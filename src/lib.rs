//! # telly-dl
//!
//! Durable download queue for media posted to chat channels.
//!
//! ## Design Philosophy
//!
//! telly-dl is designed to be:
//! - **Crash-safe** - Every pending task is on disk before it runs; nothing is lost or run twice
//! - **Bounded** - At most `max_concurrent_downloads` transfers at a time, in queue order
//! - **Library-first** - No CLI or login flow; embedders plug in their own collaborators
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! Each task goes through fetch, classify, resolve, stage, transfer and
//! commit. Transfers land in a `.tmp` file that is renamed into the library
//! only when complete, and a watchdog aborts transfers that stop making
//! progress.
//!
//! ## Quick Start
//!
//! ```no_run
//! use telly_dl::{Config, DownloadTask, MediaDownloader, Services, SourceLocator};
//! # use telly_dl::services::{ConnectorFactory, FilenameClassifier, MediaResolver};
//! # use std::sync::Arc;
//!
//! # async fn example(
//! #     connectors: Arc<dyn ConnectorFactory>,
//! #     classifier: Arc<dyn FilenameClassifier>,
//! #     resolver: Arc<dyn MediaResolver>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let services = Services::new(connectors, classifier, resolver)
//!     .with_notification_config(&config.notifications)?;
//!
//! let downloader = MediaDownloader::new(config, services).await?;
//!
//! // Subscribe to events
//! let mut events = downloader.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! // Run restored and new tasks
//! downloader.start_queue_processor();
//!
//! let task = DownloadTask::new(SourceLocator::new(Some(-1001234), 42), "Dark.S01E01.mkv");
//! downloader.enqueue(task).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Idle-connection heartbeat
pub mod heartbeat;
/// Persistent, concurrency-bounded task queue
pub mod queue;
/// External collaborator traits and implementations
pub mod services;
/// Library path templates
pub mod template;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::MediaDownloader;
pub use error::{Error, PipelineError, QueueError, Result, ServiceError};
pub use queue::{PersistentQueue, TaskHandler};
pub use services::Services;
pub use types::{
    DownloadTask, DrainOutcome, Event, IndicatorKind, MediaInfo, MediaType, PushOutcome,
    ResolveHints, ResolvedMedia, SourceLocator, TaskKey,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use telly_dl::{MediaDownloader, run_with_shutdown};
///
/// # async fn example(downloader: MediaDownloader) -> Result<(), Box<dyn std::error::Error>> {
/// // Run with automatic signal handling
/// run_with_shutdown(downloader).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "No SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "No SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register signal handlers, falling back to ctrl_c");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
