//! Error types for telly-dl
//!
//! This module groups errors by the layer that produces them:
//! - [`QueueError`] - durability problems in the persistent queue
//! - [`PipelineError`] - terminal failures of a single download attempt
//! - [`ServiceError`] - failures reported by external collaborators
//!
//! Duplicate task keys are deliberately not errors; they surface as
//! [`PushOutcome::AlreadyQueued`](crate::types::PushOutcome::AlreadyQueued).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telly-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for telly-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "media_root")
        key: Option<String>,
    },

    /// Persistent queue error
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// A download attempt failed
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be built
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Durability errors raised by the persistent queue
#[derive(Debug, Error)]
pub enum QueueError {
    /// The snapshot exists but could not be read or parsed
    #[error("failed to read queue snapshot {path}: {reason}")]
    SnapshotRead {
        /// Snapshot file path
        path: PathBuf,
        /// Why the snapshot was unreadable
        reason: String,
    },

    /// The snapshot could not be written; in-memory state is now ahead of disk
    #[error("failed to write queue snapshot {path}: {reason}")]
    SnapshotWrite {
        /// Snapshot file path
        path: PathBuf,
        /// Why the write failed
        reason: String,
    },

    /// The queue has been closed and no longer admits work
    #[error("queue is closed")]
    Closed,
}

/// Terminal failure of one download attempt
///
/// Every variant ends the attempt for that task. There is no automatic retry;
/// the task is removed from the queue regardless.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A transport connection for the task could not be opened
    #[error("failed to open source connection: {reason}")]
    Connect {
        /// Underlying transport failure
        reason: String,
    },

    /// Looking up the source failed for a reason other than absence
    #[error("failed to fetch source {source_key}: {reason}")]
    Fetch {
        /// Task key of the source
        source_key: String,
        /// Underlying transport failure
        reason: String,
    },

    /// The source message or its media no longer exists
    #[error("source {source_key} not found")]
    SourceNotFound {
        /// Task key of the source
        source_key: String,
    },

    /// The classifier could not interpret the filename hint
    #[error("classification failed for {file_name:?}: {reason}")]
    ClassificationFailed {
        /// Filename hint handed to the classifier
        file_name: String,
        /// Classifier error
        reason: String,
    },

    /// The resolver answered, but found no matching media
    #[error("no media found for {candidate_title:?}")]
    ResolutionFailed {
        /// Title the resolver searched for
        candidate_title: String,
    },

    /// The resolver could not be reached or returned an error
    #[error("media resolver unavailable: {reason}")]
    ResolverUnavailable {
        /// Underlying failure
        reason: String,
    },

    /// The destination directory could not be created
    #[error("failed to prepare destination {path}: {reason}")]
    PrepareFailed {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// No transfer progress was observed within the stall timeout
    #[error("transfer stalled: no progress for {idle:?}")]
    TransferStalled {
        /// How long the transfer had been idle when it was aborted
        idle: Duration,
    },

    /// The transfer itself failed
    #[error("transfer failed: {reason}")]
    TransferFailed {
        /// Underlying transport failure
        reason: String,
    },

    /// Renaming the finished temp file into place failed
    #[error("failed to move {temp_path} to {final_path}: {reason}")]
    CommitFailed {
        /// Temp file that holds the finished transfer
        temp_path: PathBuf,
        /// Destination that was not written
        final_path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// The task handler panicked
    #[error("task handler panicked: {reason}")]
    HandlerPanicked {
        /// Panic description from the join error
        reason: String,
    },
}

/// Errors reported by external collaborators (transport, classifier, resolver, notifiers)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The underlying connection was torn down
    #[error("connection closed")]
    Disconnected,

    /// The collaborator did not answer in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An HTTP collaborator answered with a non-success status
    #[error("unexpected status {code}: {body}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body, if any
        body: String,
    },

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Failed(e.to_string())
    }
}
