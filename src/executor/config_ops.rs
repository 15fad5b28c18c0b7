//! Runtime remote connection settings.

use crate::config::RemoteConfig;

use super::TaskExecutor;

impl TaskExecutor {
    /// Current remote connection settings (None when not configured)
    pub async fn remote_settings(&self) -> Option<RemoteConfig> {
        self.remote.read().await.clone()
    }

    /// Replace the remote connection settings
    ///
    /// Download tasks read the settings once when they start, so a running task keeps
    /// the settings it started with.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use album_dl::{Config, TaskExecutor, RemoteConfig};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let executor = TaskExecutor::new(Config::default()).await?;
    /// executor
    ///     .set_remote_settings(Some(RemoteConfig::new("https://photos.example.com", "key")))
    ///     .await;
    ///
    /// // Unconfigure: download tasks now fail with "remote server not configured"
    /// executor.set_remote_settings(None).await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set_remote_settings(&self, settings: Option<RemoteConfig>) {
        let configured = settings.is_some();
        *self.remote.write().await = settings;
        tracing::info!(configured, "remote settings updated");
    }
}
