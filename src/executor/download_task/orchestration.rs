//! Download task orchestration: top-level lifecycle of one album sync.

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::SharedArchive;
use crate::config::Config;
use crate::error::{RemoteError, TaskFailure};
use crate::retry::retry_with_backoff;
use crate::types::{TaskId, TaskOutput};

use super::chunk_processor::process_chunks;
use super::context::DownloadTaskContext;
use super::finalization::{discard_partial, finalize_download};
use super::sync_plan::SyncPlan;

/// Sync one album into a new archive
///
/// Phases:
/// 1. Resolve remote settings and build the client
/// 2. Probe connectivity with retry
/// 3. Fetch the album listing and reconcile it against local records
/// 4. Fetch missing assets chunk by chunk into the archive
/// 5. Finish the archive and record it
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) -> Result<TaskOutput, TaskFailure> {
    tracing::info!(task_id = %ctx.task_id(), album_id = %ctx.album_id, "starting album download");

    // Phase 1: settings are read once per run
    let settings = ctx.remote.read().await.clone().ok_or_else(|| {
        tracing::error!(task_id = %ctx.task_id(), "remote server not configured");
        TaskFailure::Failed(RemoteError::NotConfigured.to_string())
    })?;
    let source = ctx
        .source_factory
        .create(&settings)
        .map_err(|e| ctx.fail("failed to create remote client", e))?;

    // Phase 2: connectivity
    ctx.progress.report_step("Connecting to remote server").await;
    let progress = Arc::clone(&ctx.progress);
    retry_with_backoff(
        &ctx.config.retry,
        |attempt, max_attempts| {
            progress.announce(format!(
                "Connecting to remote server (attempt {}/{})",
                attempt, max_attempts
            ));
        },
        || source.probe(),
    )
    .await
    .map_err(|failure| {
        let message = format!(
            "could not connect to remote server after {} attempts: {}",
            failure.attempts(),
            failure.summary()
        );
        tracing::error!(task_id = %ctx.task_id(), error = %message, "connectivity check failed");
        TaskFailure::Failed(message)
    })?;

    if ctx.cancel_token.is_cancelled() {
        return Err(TaskFailure::Cancelled);
    }

    // Phase 3: listing and reconciliation
    ctx.progress.report_step("Fetching album assets").await;
    let album = source
        .album_info(&ctx.album_id)
        .await
        .map_err(|e| ctx.fail("failed to fetch album", e))?;
    let album_name = if ctx.album_name.is_empty() {
        album.name.clone()
    } else {
        ctx.album_name.clone()
    };

    let local = ctx
        .db
        .list_local_asset_ids(&ctx.album_id)
        .await
        .map_err(|e| ctx.fail("failed to read local assets", e))?;
    let plan = SyncPlan::build(&album.assets, &local);
    tracing::info!(
        task_id = %ctx.task_id(),
        album_id = %ctx.album_id,
        remote = album.assets.len(),
        local = local.len(),
        to_download = plan.to_download.len(),
        to_remove = plan.to_remove.len(),
        "sync plan ready"
    );

    if !plan.to_remove.is_empty() {
        let removed = ctx
            .db
            .remove_local_assets(&ctx.album_id, &plan.to_remove)
            .await
            .map_err(|e| ctx.fail("failed to remove stale local assets", e))?;
        tracing::info!(task_id = %ctx.task_id(), removed, "removed records of assets deleted remotely");
    }

    ctx.progress
        .set_total(plan.to_download.len() as u64)
        .await
        .map_err(|e| ctx.fail("failed to store task total", e))?;

    // Phase 4: fetch into the archive
    let archive_path = archive_path_for(&ctx.config, &ctx.album_id, ctx.task_id());
    let archive = SharedArchive::create(archive_path)
        .await
        .map_err(|e| ctx.fail("failed to create archive", e))?;

    if plan.is_noop() {
        ctx.progress.report_step("All photos already downloaded").await;
    }
    let results = process_chunks(&ctx, source.as_ref(), &archive, &plan.to_download).await;

    if let Some(failure) = results.stopped.clone() {
        discard_partial(&ctx, &archive).await;
        return Err(failure);
    }

    // Phase 5: finish
    finalize_download(&ctx, &archive, &album_name, &results).await
}

/// `<archive_dir>/<album id>_<task id>.zip`, one archive per run
pub(crate) fn archive_path_for(config: &Config, album_id: &str, task_id: &TaskId) -> PathBuf {
    let album: String = album_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    config
        .download
        .archive_dir
        .join(format!("{}_{}.zip", album, task_id))
}
