//! On-disk snapshot of pending queue entries
//!
//! The snapshot is a JSON array of `{key, data, order}` objects, rewritten in
//! full on every mutation. Writes go to `<path>.tmp` first and are renamed
//! over the snapshot, so readers only ever see a complete file.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::QueueError;
use crate::types::TaskKey;

/// One pending task as stored in the snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEntry<T> {
    /// Deduplication key (`id` in snapshots written by older releases)
    #[serde(alias = "id")]
    pub key: TaskKey,
    /// Task payload
    pub data: T,
    /// Admission order assigned at push time
    pub order: u64,
}

/// Outcome of reading the snapshot at startup
pub(crate) enum Loaded<T> {
    /// No snapshot on disk yet
    Missing,
    /// Entries sorted ascending by order
    Entries(Vec<QueueEntry<T>>),
    /// The file exists but does not parse
    Corrupt(String),
}

/// Read and parse the snapshot
///
/// I/O errors other than a missing file are returned as errors, since the
/// file may be intact and starting empty would overwrite it.
pub(crate) async fn read<T: DeserializeOwned>(path: &Path) -> Result<Loaded<T>, QueueError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Loaded::Missing),
        Err(e) => {
            return Err(QueueError::SnapshotRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    match serde_json::from_slice::<Vec<QueueEntry<T>>>(&raw) {
        Ok(mut entries) => {
            entries.sort_by_key(|e| e.order);
            Ok(Loaded::Entries(entries))
        }
        Err(e) => Ok(Loaded::Corrupt(e.to_string())),
    }
}

/// Atomically replace the snapshot with `entries`
pub(crate) async fn write<T: Serialize>(
    path: &Path,
    entries: &[&QueueEntry<T>],
) -> Result<(), QueueError> {
    let write_err = |reason: String| QueueError::SnapshotWrite {
        path: path.to_path_buf(),
        reason,
    };

    let json = serde_json::to_vec(entries).map_err(|e| write_err(e.to_string()))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_err(e.to_string()))?;
    }

    let tmp = sibling(path, ".tmp");
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| write_err(e.to_string()))?;
    file.write_all(&json)
        .await
        .map_err(|e| write_err(e.to_string()))?;
    file.sync_all().await.map_err(|e| write_err(e.to_string()))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_err(e.to_string()))
}

/// Move an unreadable snapshot out of the way and return where it went
pub(crate) async fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let backup = sibling(path, ".corrupt");
    tokio::fs::rename(path, &backup).await?;
    Ok(backup)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}
