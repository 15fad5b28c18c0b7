//! Download finalization: finish the archive, record it, or clean up a stopped run.

use crate::archive::{FinishedArchive, SharedArchive};
use crate::db::NewAlbumArchive;
use crate::error::TaskFailure;
use crate::types::TaskOutput;

use super::context::{DownloadResults, DownloadTaskContext};

/// Finish the archive and persist the album and task output records
pub(super) async fn finalize_download(
    ctx: &DownloadTaskContext,
    archive: &SharedArchive,
    album_name: &str,
    results: &DownloadResults,
) -> Result<TaskOutput, TaskFailure> {
    let FinishedArchive {
        path: archive_path,
        entry_count,
        size_bytes,
    } = archive
        .finish()
        .await
        .map_err(|e| ctx.fail("failed to finish archive", e))?;

    let downloaded_album_id = ctx
        .db
        .record_album_archive(&NewAlbumArchive {
            album_id: ctx.album_id.clone(),
            album_name: album_name.to_string(),
            archive_path: archive_path.clone(),
            photo_count: entry_count,
            size_bytes,
        })
        .await
        .map_err(|e| ctx.fail("failed to record album archive", e))?;

    let output = TaskOutput {
        archive_path,
        size_bytes,
        processed_count: results.downloaded.len() as u64,
    };
    ctx.db
        .set_output(ctx.task_id(), &output)
        .await
        .map_err(|e| ctx.fail("failed to store task output", e))?;

    let summary = match (results.downloaded.len(), results.skipped.len()) {
        (0, 0) => "All photos already downloaded".to_string(),
        (downloaded, 0) => format!("Downloaded {} photos", downloaded),
        (downloaded, skipped) => format!("Downloaded {} photos, {} failed", downloaded, skipped),
    };
    ctx.progress.report_step(summary).await;

    tracing::info!(
        task_id = %ctx.task_id(),
        album_id = %ctx.album_id,
        downloaded_album_id,
        downloaded = results.downloaded.len(),
        skipped = results.skipped.len(),
        size_bytes,
        "album download finished"
    );

    Ok(output)
}

/// Undo a run that stopped early
///
/// Deletes the partial archive and the local records added by this run, so the next
/// sync fetches those assets again.
pub(super) async fn discard_partial(ctx: &DownloadTaskContext, archive: &SharedArchive) {
    tracing::debug!(task_id = %ctx.task_id(), archive = ?archive.path(), "removing partial archive");
    archive.discard().await;

    match ctx.db.remove_task_assets(ctx.task_id()).await {
        Ok(0) => {}
        Ok(removed) => {
            tracing::debug!(task_id = %ctx.task_id(), removed, "rolled back local asset records");
        }
        Err(e) => {
            tracing::warn!(
                task_id = %ctx.task_id(),
                error = %e,
                "failed to roll back local asset records"
            );
        }
    }
}
