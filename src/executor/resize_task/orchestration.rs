//! Resize task orchestration: source archives + profile -> new archive of JPEGs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::archive::{ArchiveEntry, SharedArchive, read_image_entries};
use crate::config::Config;
use crate::db::{Database, DownloadedAlbum, ResizeProfile};
use crate::error::TaskFailure;
use crate::resize::{ImageResizer, ResizeOutcome, ResizeTarget};
use crate::types::{TaskId, TaskOutput};

use super::super::progress::ProgressTracker;

/// Everything one resize run needs, passed explicitly by the dispatch loop
pub(crate) struct ResizeTaskContext {
    pub(crate) downloaded_album_id: i64,
    pub(crate) profile_id: i64,
    pub(crate) db: Arc<Database>,
    pub(crate) config: Arc<Config>,
    pub(crate) resizer: Arc<dyn ImageResizer>,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) cancel_token: CancellationToken,
}

impl ResizeTaskContext {
    fn task_id(&self) -> &TaskId {
        self.progress.task_id()
    }

    fn fail(&self, context: &str, error: impl std::fmt::Display) -> TaskFailure {
        tracing::error!(task_id = %self.task_id(), error = %error, "{}", context);
        TaskFailure::with_context(context, error)
    }
}

#[derive(Debug, Default)]
struct ResizeCounts {
    resized: u64,
    skipped: u64,
    failed: u64,
}

impl ResizeCounts {
    fn summary(&self) -> String {
        let mut summary = format!("Resized {} images", self.resized);
        if self.skipped > 0 {
            summary.push_str(&format!(", {} skipped by orientation", self.skipped));
        }
        if self.failed > 0 {
            summary.push_str(&format!(", {} failed", self.failed));
        }
        summary
    }
}

/// Resize every image of a downloaded album into a new archive
///
/// Image-level failures are counted and logged; failures to read the sources or write
/// the output abort the run. Cancellation is checked before each image.
pub(crate) async fn run_resize_task(ctx: ResizeTaskContext) -> Result<TaskOutput, TaskFailure> {
    tracing::info!(
        task_id = %ctx.task_id(),
        downloaded_album_id = ctx.downloaded_album_id,
        profile_id = ctx.profile_id,
        "starting album resize"
    );

    let (profile, album, sources) = load_inputs(&ctx).await?;

    ctx.progress
        .report_step(format!("Reading {} archives of {}", sources.len(), album.album_name))
        .await;
    let entries = extract_images(&ctx, sources).await?;
    ctx.progress
        .set_total(entries.len() as u64)
        .await
        .map_err(|e| ctx.fail("failed to store task total", e))?;

    let writer = SharedArchive::create(output_path_for(&ctx.config, ctx.task_id()))
        .await
        .map_err(|e| ctx.fail("failed to create output archive", e))?;

    let target = ResizeTarget::from_profile(&profile, ctx.config.resize.letterbox);
    ctx.progress
        .report_step(format!(
            "Resizing {} images to {}x{} ({})",
            entries.len(),
            target.width,
            target.height,
            profile.name
        ))
        .await;

    let mut counts = ResizeCounts::default();
    for entry in entries {
        if ctx.cancel_token.is_cancelled() {
            tracing::info!(task_id = %ctx.task_id(), resized = counts.resized, "cancellation observed, stopping resize");
            writer.discard().await;
            return Err(TaskFailure::Cancelled);
        }

        let name = entry.name.clone();
        match resize_one(&ctx, entry, target).await {
            Ok(ResizeOutcome::Resized(jpeg)) => {
                if let Err(e) = writer.append(jpeg_name(&name), jpeg).await {
                    writer.discard().await;
                    return Err(ctx.fail("failed to write output archive", e));
                }
                counts.resized += 1;
            }
            Ok(ResizeOutcome::Skipped(orientation)) => {
                tracing::debug!(task_id = %ctx.task_id(), entry = %name, ?orientation, "skipped by orientation filter");
                counts.skipped += 1;
            }
            Err(message) => {
                tracing::warn!(task_id = %ctx.task_id(), entry = %name, error = %message, "failed to resize image");
                counts.failed += 1;
            }
        }

        ctx.progress.advance().await;
    }

    let finished = writer
        .finish()
        .await
        .map_err(|e| ctx.fail("failed to finish output archive", e))?;
    let size_bytes = finished.size_bytes;
    let output = TaskOutput {
        archive_path: finished.path,
        size_bytes,
        processed_count: counts.resized,
    };
    ctx.db
        .set_output(ctx.task_id(), &output)
        .await
        .map_err(|e| ctx.fail("failed to store task output", e))?;
    ctx.progress.report_step(counts.summary()).await;

    tracing::info!(
        task_id = %ctx.task_id(),
        resized = counts.resized,
        skipped = counts.skipped,
        failed = counts.failed,
        size_bytes,
        "album resize finished"
    );

    Ok(output)
}

async fn load_inputs(
    ctx: &ResizeTaskContext,
) -> Result<(ResizeProfile, DownloadedAlbum, Vec<PathBuf>), TaskFailure> {
    let profile = ctx
        .db
        .get_resize_profile(ctx.profile_id)
        .await
        .map_err(|e| ctx.fail("failed to load resize profile", e))?
        .ok_or_else(|| {
            TaskFailure::Failed(format!("resize profile {} not found", ctx.profile_id))
        })?;

    let album = ctx
        .db
        .get_downloaded_album(ctx.downloaded_album_id)
        .await
        .map_err(|e| ctx.fail("failed to load downloaded album", e))?
        .ok_or_else(|| {
            TaskFailure::Failed(format!(
                "downloaded album {} not found",
                ctx.downloaded_album_id
            ))
        })?;

    let sources = ctx
        .db
        .list_album_archives(album.id)
        .await
        .map_err(|e| ctx.fail("failed to list album archives", e))?
        .iter()
        .map(|archive| archive.path())
        .collect();

    Ok((profile, album, sources))
}

/// Read every image entry of the source archives on the blocking pool
async fn extract_images(
    ctx: &ResizeTaskContext,
    sources: Vec<PathBuf>,
) -> Result<Vec<ArchiveEntry>, TaskFailure> {
    let resize_config = ctx.config.resize.clone();
    tokio::task::spawn_blocking(move || read_image_entries(&sources, &resize_config))
        .await
        .map_err(|e| ctx.fail("archive reader stopped", e))?
        .map_err(|e| ctx.fail("failed to read source archives", e))
}

/// Resize one image on the blocking pool; errors come back as their message
async fn resize_one(
    ctx: &ResizeTaskContext,
    entry: ArchiveEntry,
    target: ResizeTarget,
) -> Result<ResizeOutcome, String> {
    let resizer = Arc::clone(&ctx.resizer);
    match tokio::task::spawn_blocking(move || resizer.resize(&entry.bytes, &target)).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("resizer stopped: {}", e)),
    }
}

/// `<output_dir>/<task id>.zip`
pub(crate) fn output_path_for(config: &Config, task_id: &TaskId) -> PathBuf {
    config.download.output_dir.join(format!("{}.zip", task_id))
}

/// `<stem>.jpg`
fn jpeg_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.jpg", stem)
}
