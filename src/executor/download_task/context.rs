//! Download task context: shared state for one run and per-asset outcomes.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RemoteConfig};
use crate::db::Database;
use crate::error::TaskFailure;
use crate::remote::AssetSourceFactory;
use crate::types::TaskId;

use super::super::progress::ProgressTracker;

/// Everything one download run needs, passed explicitly by the dispatch loop
pub(crate) struct DownloadTaskContext {
    pub(crate) album_id: String,
    pub(crate) album_name: String,
    pub(crate) db: Arc<Database>,
    pub(crate) config: Arc<Config>,
    pub(crate) remote: Arc<RwLock<Option<RemoteConfig>>>,
    pub(crate) source_factory: Arc<dyn AssetSourceFactory>,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) cancel_token: CancellationToken,
}

impl DownloadTaskContext {
    pub(super) fn task_id(&self) -> &TaskId {
        self.progress.task_id()
    }

    /// Log an engine-level failure and turn it into a [`TaskFailure`]
    pub(super) fn fail(&self, context: &str, error: impl std::fmt::Display) -> TaskFailure {
        tracing::error!(
            task_id = %self.task_id(),
            album_id = %self.album_id,
            error = %error,
            "{}",
            context
        );
        TaskFailure::with_context(context, error)
    }
}

/// Result of fetching one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum AssetOutcome {
    /// Bytes were appended to the archive under `entry_name`
    Downloaded { asset_id: String, entry_name: String },
    /// The fetch failed; the asset is left for the next sync
    Skipped { asset_id: String, reason: String },
}

/// Aggregated outcome of the chunk loop
#[derive(Debug, Default)]
pub(super) struct DownloadResults {
    /// Asset ids appended to the archive and recorded locally, in completion order
    pub(super) downloaded: Vec<String>,
    /// Asset ids whose fetch failed
    pub(super) skipped: Vec<String>,
    /// Set when the loop stopped early (cancellation or a fatal archive error)
    pub(super) stopped: Option<TaskFailure>,
}
