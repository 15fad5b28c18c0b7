//! Album catalog refresh.

use crate::db::CatalogAlbum;
use crate::error::{Error, RemoteError, Result};

use super::TaskExecutor;

impl TaskExecutor {
    /// List the server's albums and store them as the album catalog
    ///
    /// Runs inline rather than as a queued task, with the current remote settings.
    /// Albums the server no longer lists are dropped from the catalog. Returns the
    /// stored catalog ordered by name.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotConfigured`] without remote settings, otherwise the remote or
    /// database error. The previous catalog is kept on error.
    pub async fn refresh_album_catalog(&self) -> Result<Vec<CatalogAlbum>> {
        let settings = self
            .remote_settings()
            .await
            .ok_or(Error::Remote(RemoteError::NotConfigured))?;
        let source = self.services.source_factory.create(&settings)?;

        let albums = source.list_albums().await.inspect_err(|e| {
            tracing::warn!(error = %e, "failed to list remote albums");
        })?;
        let stored = self.db.replace_album_catalog(&albums).await?;
        tracing::info!(albums = stored, "album catalog refreshed");

        self.db.list_album_catalog().await
    }
}
