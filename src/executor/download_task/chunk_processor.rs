//! Chunked fetching: bounded concurrency inside a chunk, cancellation between chunks.

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::archive::SharedArchive;
use crate::error::TaskFailure;
use crate::remote::AssetSource;
use crate::types::AssetRef;

use super::context::{AssetOutcome, DownloadResults, DownloadTaskContext};

/// Fetch `assets` chunk by chunk into the archive
///
/// Cancellation is checked before each chunk starts; fetches already running in a chunk
/// finish normally. A failed fetch skips the asset. A failed archive write stops the
/// loop after the current chunk.
pub(super) async fn process_chunks(
    ctx: &DownloadTaskContext,
    source: &dyn AssetSource,
    archive: &SharedArchive,
    assets: &[AssetRef],
) -> DownloadResults {
    let chunk_size = ctx.config.download.chunk_size.max(1);
    let chunk_count = assets.len().div_ceil(chunk_size);
    let limiter = Semaphore::new(ctx.config.download.max_concurrent_fetches.max(1));
    let mut results = DownloadResults::default();

    for (index, chunk) in assets.chunks(chunk_size).enumerate() {
        if ctx.cancel_token.is_cancelled() {
            tracing::info!(
                task_id = %ctx.task_id(),
                chunks_done = index,
                chunk_count,
                "cancellation observed, not starting next chunk"
            );
            results.stopped = Some(TaskFailure::Cancelled);
            break;
        }

        ctx.progress
            .report_step(format!(
                "Downloading chunk {}/{} ({} photos)",
                index + 1,
                chunk_count,
                chunk.len()
            ))
            .await;
        tracing::debug!(task_id = %ctx.task_id(), chunk = index + 1, size = chunk.len(), "starting chunk");

        let fetches = chunk
            .iter()
            .map(|asset| fetch_into_archive(ctx, source, archive, &limiter, asset));

        for outcome in join_all(fetches).await {
            match outcome {
                Ok(AssetOutcome::Downloaded { asset_id, .. }) => results.downloaded.push(asset_id),
                Ok(AssetOutcome::Skipped { asset_id, .. }) => results.skipped.push(asset_id),
                Err(failure) => {
                    results.stopped.get_or_insert(failure);
                }
            }
        }

        if results.stopped.is_some() {
            break;
        }
    }

    results
}

/// Fetch one asset, append it to the archive, record it and advance progress
async fn fetch_into_archive(
    ctx: &DownloadTaskContext,
    source: &dyn AssetSource,
    archive: &SharedArchive,
    limiter: &Semaphore,
    asset: &AssetRef,
) -> Result<AssetOutcome, TaskFailure> {
    let bytes = {
        let _permit = limiter
            .acquire()
            .await
            .map_err(|_| TaskFailure::Failed("fetch limiter closed".to_string()))?;
        source.fetch_asset_bytes(&asset.id).await
    };

    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                task_id = %ctx.task_id(),
                asset_id = %asset.id,
                error = %e,
                "failed to fetch asset - skipping"
            );
            return Ok(AssetOutcome::Skipped {
                asset_id: asset.id.clone(),
                reason: e.to_string(),
            });
        }
    };

    let entry_name = archive
        .append(asset.original_filename.clone(), bytes)
        .await
        .map_err(|e| ctx.fail("failed to write archive", e))?;

    if let Err(e) = ctx.db.add_local_asset(&ctx.album_id, &asset.id, ctx.task_id()).await {
        tracing::warn!(
            task_id = %ctx.task_id(),
            asset_id = %asset.id,
            error = %e,
            "failed to record local asset, it will be fetched again next sync"
        );
    }

    let progress = ctx.progress.advance().await;
    tracing::debug!(
        task_id = %ctx.task_id(),
        asset_id = %asset.id,
        entry = %entry_name,
        progress,
        "asset stored"
    );

    Ok(AssetOutcome::Downloaded {
        asset_id: asset.id.clone(),
        entry_name,
    })
}
