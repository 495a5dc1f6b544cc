//! Download task orchestration: the per-task state machine

use std::path::PathBuf;
use std::sync::Arc;

use super::context::{DownloadPipeline, StagedPaths};
use super::finalization::{commit, finish_failure, finish_success};
use super::transfer::stream_with_watchdog;
use crate::error::PipelineError;
use crate::services::SourceConnector;
use crate::template::destination_path;
use crate::types::{DownloadTask, Event, IndicatorKind, ResolveHints, ResolvedMedia};
use crate::utils::{clean_file_name, file_extension, temp_path_for};

/// Run one task through the pipeline
///
/// Phases:
/// 1. Fetch the source through a fresh connection
/// 2. Classify the filename hint
/// 3. Resolve the media identity
/// 4. Prepare the destination directory and temp path
/// 5. Stream into the temp path under the stall watchdog
/// 6. Rename onto the final path
///
/// The connection is reset once the task ends, whatever the outcome. Any
/// failure removes the partial file before the error is returned.
pub(crate) async fn run_download_task(
    pipeline: &DownloadPipeline,
    task: DownloadTask,
) -> Result<(), PipelineError> {
    let key = task.key();
    tracing::info!(key = %key, file_name = %task.file_name, "download started");
    pipeline.emit(Event::Started { key: key.clone() });

    let connector = match pipeline.services.connectors.open().await {
        Ok(connector) => connector,
        Err(e) => {
            let error = PipelineError::Connect {
                reason: e.to_string(),
            };
            finish_failure(pipeline, &task, None, &error).await;
            return Err(error);
        }
    };

    let mut staged = None;
    let result = execute(pipeline, &task, &connector, &mut staged).await;

    if let Err(e) = connector.reset().await {
        tracing::debug!(key = %key, error = %e, "connection reset failed");
    }

    match result {
        Ok(final_path) => {
            finish_success(pipeline, &task, final_path);
            Ok(())
        }
        Err(error) => {
            finish_failure(pipeline, &task, staged.as_ref(), &error).await;
            Err(error)
        }
    }
}

/// Phases 1 to 6; records the staged paths as soon as they exist so the caller can clean up
async fn execute(
    pipeline: &DownloadPipeline,
    task: &DownloadTask,
    connector: &Arc<dyn SourceConnector>,
    staged: &mut Option<StagedPaths>,
) -> Result<PathBuf, PipelineError> {
    let key = task.key();

    // Phase 1: fetch
    let handle = connector
        .fetch(&task.source)
        .await
        .map_err(|e| PipelineError::Fetch {
            source_key: key.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| PipelineError::SourceNotFound {
            source_key: key.to_string(),
        })?;
    pipeline.notifier.indicate(task.source, IndicatorKind::Received);
    tracing::info!(key = %key, media_id = %handle.media_id, size_bytes = ?handle.size_bytes, "source located");

    // Phases 2-3: classify and resolve
    let media = identify(pipeline, task).await?;
    tracing::info!(
        key = %key,
        title = %media.title,
        year = ?media.year,
        media_type = ?media.media_type,
        "media resolved"
    );

    // Phase 4: prepare destination
    let download = &pipeline.config.download;
    let final_path = destination_path(
        &download.media_root,
        &download.movie_template,
        &download.series_template,
        &media,
    );
    if let Some(parent) = final_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::PrepareFailed {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
    }
    let paths = staged.insert(StagedPaths {
        temp_path: temp_path_for(&final_path),
        final_path,
    });
    tracing::info!(key = %key, path = %paths.final_path.display(), "destination prepared");

    // Phase 5: transfer
    pipeline.notifier.indicate(task.source, IndicatorKind::Progress);
    let on_percent = |bytes_done: u64, bytes_total: u64, percent: u8| {
        tracing::debug!(key = %key, bytes_done, bytes_total, percent, "transfer progress");
        pipeline.emit(Event::Progress {
            key: key.clone(),
            bytes_done,
            bytes_total,
            percent,
        });
    };
    let written = stream_with_watchdog(
        &key,
        connector,
        &handle,
        &paths.temp_path,
        &pipeline.config.watchdog,
        &on_percent,
    )
    .await
    .inspect_err(|e| {
        if let PipelineError::TransferStalled { idle } = e {
            pipeline.emit(Event::Stalled {
                key: key.clone(),
                idle_secs: idle.as_secs(),
            });
        }
    })?;
    tracing::info!(key = %key, bytes = written, "transfer finished");

    // Phase 6: commit
    commit(paths).await
}

/// Classify the filename hint and resolve it to a media identity
async fn identify(
    pipeline: &DownloadPipeline,
    task: &DownloadTask,
) -> Result<ResolvedMedia, PipelineError> {
    let hint = if pipeline.config.download.clean_file_names {
        clean_file_name(&task.file_name)
    } else {
        task.file_name.clone()
    };

    let info = pipeline
        .services
        .classifier
        .classify(&hint)
        .await
        .map_err(|e| PipelineError::ClassificationFailed {
            file_name: hint.clone(),
            reason: e.to_string(),
        })?;
    tracing::debug!(
        file_name = %hint,
        candidate_title = %info.candidate_title,
        is_movie = info.is_movie,
        "filename classified"
    );

    let extension = file_extension(&task.file_name);
    let hints = ResolveHints::from_info(&info, extension.clone());
    let mut media = pipeline
        .services
        .resolver
        .resolve(&info.candidate_title, &hints)
        .await
        .map_err(|e| PipelineError::ResolverUnavailable {
            reason: e.to_string(),
        })?
        .ok_or_else(|| PipelineError::ResolutionFailed {
            candidate_title: info.candidate_title.clone(),
        })?;

    if media.extension.is_empty() {
        media.extension = extension;
    }
    Ok(media)
}
