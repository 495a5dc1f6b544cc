//! Commit and terminal-state handling

use std::path::PathBuf;

use super::context::{DownloadPipeline, StagedPaths};
use crate::error::PipelineError;
use crate::types::{DownloadTask, Event, IndicatorKind};
use crate::utils::remove_temp_file;

/// Move the finished temp file onto its final path
///
/// Both paths share a directory, so the rename is atomic.
pub(super) async fn commit(staged: &StagedPaths) -> Result<PathBuf, PipelineError> {
    tokio::fs::rename(&staged.temp_path, &staged.final_path)
        .await
        .map_err(|e| PipelineError::CommitFailed {
            temp_path: staged.temp_path.clone(),
            final_path: staged.final_path.clone(),
            reason: e.to_string(),
        })?;
    Ok(staged.final_path.clone())
}

/// Publish a successful commit: indicator, library refresh, event
pub(super) fn finish_success(pipeline: &DownloadPipeline, task: &DownloadTask, final_path: PathBuf) {
    let key = task.key();
    tracing::info!(key = %key, path = %final_path.display(), "download completed");

    pipeline.notifier.indicate(task.source, IndicatorKind::Success);
    pipeline.notifier.refresh_library();
    pipeline.emit(Event::Completed {
        key,
        path: final_path,
        timestamp: chrono::Utc::now().timestamp(),
    });
}

/// Clean up after a terminal failure and publish it
///
/// Removes any partial transfer first so no `.tmp` file outlives the attempt.
pub(super) async fn finish_failure(
    pipeline: &DownloadPipeline,
    task: &DownloadTask,
    staged: Option<&StagedPaths>,
    error: &PipelineError,
) {
    let key = task.key();

    if let Some(staged) = staged {
        match remove_temp_file(&staged.temp_path).await {
            Ok(true) => tracing::debug!(key = %key, path = %staged.temp_path.display(), "removed partial file"),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                key = %key,
                path = %staged.temp_path.display(),
                error = %e,
                "failed to remove partial file"
            ),
        }
    }

    tracing::error!(key = %key, file_name = %task.file_name, error = %error, "download failed");

    pipeline.notifier.indicate(task.source, indicator_for(error));
    pipeline.emit(Event::Failed {
        key,
        error: error.to_string(),
    });
}

/// Indicator shown for a terminal failure
pub(super) fn indicator_for(error: &PipelineError) -> IndicatorKind {
    match error {
        PipelineError::SourceNotFound { .. } => IndicatorKind::NotFound,
        PipelineError::ResolutionFailed { .. } => IndicatorKind::Unresolved,
        _ => IndicatorKind::Failure,
    }
}
