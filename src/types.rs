//! Core types for telly-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique key of a queued task
///
/// Derived from the chat/message coordinates of the source, so the same message
/// can only be pending once.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(pub String);

impl TaskKey {
    /// Create a new TaskKey
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for TaskKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat coordinates of a message carrying media
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Chat the message was posted in (None for the saved-messages chat)
    pub chat_id: Option<i64>,
    /// Message id within the chat
    pub message_id: i32,
}

impl SourceLocator {
    /// Create a new SourceLocator
    pub fn new(chat_id: Option<i64>, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }

    /// Queue key for this source: `"{chat_id}-{message_id}"`
    ///
    /// Without a chat id the key is `"undefined-{message_id}"`, which matches
    /// keys written by earlier releases so restored entries still deduplicate.
    pub fn task_key(&self) -> TaskKey {
        match self.chat_id {
            Some(chat) => TaskKey(format!("{}-{}", chat, self.message_id)),
            None => TaskKey(format!("undefined-{}", self.message_id)),
        }
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.task_key())
    }
}

/// One unit of download work
///
/// Serialized through [`StoredTask`] so that snapshots written by older
/// releases keep loading after the payload shape changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StoredTask", try_from = "StoredTask")]
pub struct DownloadTask {
    /// Where the media lives
    pub source: SourceLocator,
    /// Original filename, used as the classification hint
    pub file_name: String,
}

impl DownloadTask {
    /// Create a new DownloadTask
    pub fn new(source: SourceLocator, file_name: impl Into<String>) -> Self {
        Self {
            source,
            file_name: file_name.into(),
        }
    }

    /// Queue key for this task
    pub fn key(&self) -> TaskKey {
        self.source.task_key()
    }
}

impl std::fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DownloadTask(source={}, file_name={})",
            self.source, self.file_name
        )
    }
}

/// On-disk representation of a [`DownloadTask`]
///
/// Untagged so both the versioned form and the original un-versioned shape
/// are accepted. New snapshots are always written as the latest version.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredTask {
    /// Explicitly versioned payload
    Versioned(VersionedTask),
    /// Payload written before versioning (`chatId` stored as a string)
    Legacy(LegacyTask),
}

/// Versioned task payloads
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum VersionedTask {
    /// First versioned layout
    #[serde(rename = "v1")]
    V1 {
        /// Chat id
        chat_id: Option<i64>,
        /// Message id
        message_id: i32,
        /// Filename hint
        file_name: String,
    },
}

/// Un-versioned payload layout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTask {
    /// Chat id as a decimal string
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Message id
    pub message_id: i32,
    /// Filename hint
    pub file_name: String,
}

impl From<DownloadTask> for StoredTask {
    fn from(task: DownloadTask) -> Self {
        StoredTask::Versioned(VersionedTask::V1 {
            chat_id: task.source.chat_id,
            message_id: task.source.message_id,
            file_name: task.file_name,
        })
    }
}

impl TryFrom<StoredTask> for DownloadTask {
    type Error = String;

    fn try_from(stored: StoredTask) -> Result<Self, Self::Error> {
        match stored {
            StoredTask::Versioned(VersionedTask::V1 {
                chat_id,
                message_id,
                file_name,
            }) => Ok(DownloadTask::new(
                SourceLocator::new(chat_id, message_id),
                file_name,
            )),
            StoredTask::Legacy(legacy) => {
                let chat_id = legacy
                    .chat_id
                    .as_deref()
                    .map(|raw| {
                        raw.trim()
                            .parse::<i64>()
                            .map_err(|e| format!("invalid legacy chatId {raw:?}: {e}"))
                    })
                    .transpose()?;
                Ok(DownloadTask::new(
                    SourceLocator::new(chat_id, legacy.message_id),
                    legacy.file_name,
                ))
            }
        }
    }
}

/// Concrete media behind a source, as returned by the source connector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHandle {
    /// Connector-specific media reference
    pub media_id: String,
    /// Size in bytes, if known before the transfer
    pub size_bytes: Option<u64>,
}

/// Classifier output for a filename hint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Best guess at the title
    pub candidate_title: String,
    /// Release year
    pub year: Option<i32>,
    /// Season number
    pub season: Option<u32>,
    /// Episode number
    pub episode: Option<u32>,
    /// Whether the file looks like a movie rather than an episode
    pub is_movie: bool,
    /// Quality tag (e.g. "1080p")
    pub quality: Option<String>,
}

/// Hints passed to the media resolver alongside the candidate title
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveHints {
    /// Prefer movie matches over series matches
    pub is_movie: bool,
    /// Release year
    pub year: Option<i32>,
    /// Season number
    pub season: Option<u32>,
    /// Episode number
    pub episode: Option<u32>,
    /// Extension of the source file (without dot)
    pub file_extension: String,
}

impl ResolveHints {
    /// Build hints from classifier output and the source file extension
    pub fn from_info(info: &MediaInfo, file_extension: impl Into<String>) -> Self {
        Self {
            is_movie: info.is_movie,
            year: info.year,
            season: info.season,
            episode: info.episode,
            file_extension: file_extension.into(),
        }
    }
}

/// Kind of resolved media
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Feature film
    Movie,
    /// Episode of a series
    Series,
}

/// Canonical media record produced by the resolver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMedia {
    /// Movie or series
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Localized title
    pub title: String,
    /// Title in the original language
    pub original_title: String,
    /// Release (or first air) year
    pub year: Option<i32>,
    /// Season number (series only)
    pub season: Option<u32>,
    /// Episode number (series only)
    pub episode: Option<u32>,
    /// Episode title (series only)
    pub episode_name: Option<String>,
    /// File extension to write (without dot)
    pub extension: String,
    /// ISO 639-1 code of the original language (e.g. "ml")
    pub language_code: Option<String>,
    /// Full name of the original language (e.g. "Malayalam")
    pub language_name: Option<String>,
    /// Origin countries (e.g. ["IN"])
    #[serde(default)]
    pub origin_country: Vec<String>,
}

/// Indicator shown on the source message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// Source located, processing started
    Received,
    /// Transfer in progress
    Progress,
    /// Saved to the library
    Success,
    /// Failed at some stage
    Failure,
    /// The source message or media no longer exists
    NotFound,
    /// No matching media was found for the file
    Unresolved,
}

/// Result of pushing a task into the persistent queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Recorded and admitted
    Queued {
        /// Assigned admission order
        order: u64,
        /// Whether the snapshot write succeeded (false: lost on crash)
        durable: bool,
    },
    /// A task with the same key is already pending; nothing changed
    AlreadyQueued,
}

/// Result of waiting for the queue to empty
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every pending task completed
    Idle,
    /// The timeout elapsed first
    TimedOut {
        /// Tasks still pending when the wait ended
        remaining: usize,
    },
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task recorded in the queue
    Queued {
        /// Task key
        key: TaskKey,
        /// Admission order
        order: u64,
    },

    /// Push ignored because the key is already pending
    AlreadyQueued {
        /// Task key
        key: TaskKey,
    },

    /// Pending tasks reloaded from the snapshot at startup
    Restored {
        /// Number of tasks restored
        count: usize,
    },

    /// Pipeline started for a task
    Started {
        /// Task key
        key: TaskKey,
    },

    /// Transfer progress (emitted when the whole percentage changes)
    Progress {
        /// Task key
        key: TaskKey,
        /// Bytes written so far
        bytes_done: u64,
        /// Total bytes, if known
        bytes_total: u64,
        /// Progress percentage (0 to 100)
        percent: u8,
    },

    /// Transfer aborted by the stall watchdog
    Stalled {
        /// Task key
        key: TaskKey,
        /// Seconds without progress
        idle_secs: u64,
    },

    /// File committed to the library
    Completed {
        /// Task key
        key: TaskKey,
        /// Final path of the file
        path: PathBuf,
        /// Unix timestamp (seconds)
        timestamp: i64,
    },

    /// Pipeline failed for a task
    Failed {
        /// Task key
        key: TaskKey,
        /// Error message
        error: String,
    },

    /// A best-effort notification could not be delivered
    NotificationFailed {
        /// What was being notified (e.g. "library_refresh")
        target: String,
        /// Error message
        error: String,
    },

    /// Downloader shut down
    Shutdown,
}
