//! Event-driven waits and filesystem assertions for integration tests

use std::path::{Path, PathBuf};
use std::time::Duration;
use telly_dl::{Event, TaskKey};
use tokio::sync::broadcast;

/// Terminal result of one task as seen on the event stream
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// File committed at this path
    Completed(PathBuf),
    /// Pipeline failed with this error
    Failed(String),
    /// Timeout waiting for an outcome
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for the task with `key` to complete or fail
///
/// Subscribe before enqueueing, otherwise the outcome may already be gone.
pub async fn wait_for_outcome(
    events: &mut broadcast::Receiver<Event>,
    key: &TaskKey,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { key: event_key, path, .. }) if event_key == *key => {
                    return WaitResult::Completed(path);
                }
                Ok(Event::Failed {
                    key: event_key,
                    error,
                }) if event_key == *key => {
                    return WaitResult::Failed(error);
                }
                Ok(_) => continue,
                // missed some events; keep waiting for ours
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Every file under `dir`, recursively and sorted
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found.sort();
    found
}

/// Assert that no `.tmp` transfer file is left anywhere under `dir`
pub fn assert_no_partial_files(dir: &Path) {
    let partial: Vec<_> = files_under(dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
        .collect();
    assert!(partial.is_empty(), "partial files left behind: {partial:?}");
}

/// Keys recorded in the queue snapshot at `path`
pub fn snapshot_keys(path: &Path) -> Vec<String> {
    let raw = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {path:?}: {e}"));
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(&raw).unwrap_or_else(|e| panic!("parse {path:?}: {e}"));
    entries
        .iter()
        .filter_map(|entry| entry["key"].as_str().map(str::to_string))
        .collect()
}

/// Poll `check` every 10ms until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
