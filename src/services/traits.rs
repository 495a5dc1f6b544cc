//! Capability contracts for the collaborators the download pipeline depends on

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::types::{ContentHandle, IndicatorKind, MediaInfo, ResolveHints, ResolvedMedia, SourceLocator};

/// Progress callback invoked by [`SourceConnector::stream`] with `(bytes_done, bytes_total)`
///
/// `bytes_total` is 0 when the size is unknown.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Transport connection used for one task execution
///
/// Every task gets its own instance from [`ConnectorFactory::open`], so
/// [`reset`](SourceConnector::reset) only ever affects the task that owns it.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Resolve a source to its media, or `Ok(None)` when the message or media is gone
    async fn fetch(&self, source: &SourceLocator) -> Result<Option<ContentHandle>, ServiceError>;

    /// Write the media to `dest`, reporting progress per chunk
    ///
    /// Returns the number of bytes written.
    async fn stream(
        &self,
        handle: &ContentHandle,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, ServiceError>;

    /// Tear down the connection, aborting any in-flight stream
    async fn reset(&self) -> Result<(), ServiceError>;
}

/// Opens a fresh [`SourceConnector`] per task execution
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Open a new connection
    async fn open(&self) -> Result<Arc<dyn SourceConnector>, ServiceError>;
}

/// Turns a filename hint into a structured guess about the media
#[async_trait]
pub trait FilenameClassifier: Send + Sync {
    /// Classify a filename hint
    async fn classify(&self, file_name: &str) -> Result<MediaInfo, ServiceError>;
}

/// Looks up the canonical identity of a title
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve a candidate title, or `Ok(None)` when nothing matches
    async fn resolve(
        &self,
        candidate_title: &str,
        hints: &ResolveHints,
    ) -> Result<Option<ResolvedMedia>, ServiceError>;
}

/// Tells the media server to rescan its library
#[async_trait]
pub trait LibraryNotifier: Send + Sync {
    /// Request a library refresh
    async fn notify(&self) -> Result<(), ServiceError>;

    /// Short name used in logs and events
    fn name(&self) -> &str;
}

/// Shows task status on the source message (e.g. a reaction)
#[async_trait]
pub trait IndicatorChannel: Send + Sync {
    /// Show `kind` on the message at `source`
    async fn emit(&self, source: &SourceLocator, kind: IndicatorKind) -> Result<(), ServiceError>;
}

/// Long-lived session connection kept alive between tasks
#[async_trait]
pub trait SessionConnection: Send + Sync {
    /// Whether the session is currently connected
    fn is_connected(&self) -> bool;

    /// Re-establish the session
    async fn reconnect(&self) -> Result<(), ServiceError>;
}
