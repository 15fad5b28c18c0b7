//! Remote photo server access
//!
//! The download engine talks to the server only through [`AssetSource`], and obtains a
//! source for the current settings through an [`AssetSourceFactory`]. Tests inject
//! in-memory implementations of both.

mod immich;

pub use immich::ImmichClient;

use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::types::{AlbumInfo, AlbumSummary};

/// Operations consumed from the remote photo server
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Check that the server is reachable and accepts the API key
    async fn probe(&self) -> Result<()>;

    /// List every album visible to the API key
    async fn list_albums(&self) -> Result<Vec<AlbumSummary>>;

    /// Album metadata including its full asset listing
    async fn album_info(&self, album_id: &str) -> Result<AlbumInfo>;

    /// Original bytes of one asset
    async fn fetch_asset_bytes(&self, asset_id: &str) -> Result<Vec<u8>>;
}

/// Builds an [`AssetSource`] from connection settings
///
/// Called once per download task with the settings current at that moment.
pub trait AssetSourceFactory: Send + Sync {
    /// Create a source for `settings`
    fn create(&self, settings: &RemoteConfig) -> Result<Box<dyn AssetSource>>;
}

/// Default factory producing [`ImmichClient`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmichClientFactory;

impl AssetSourceFactory for ImmichClientFactory {
    fn create(&self, settings: &RemoteConfig) -> Result<Box<dyn AssetSource>> {
        let client = ImmichClient::new(settings)?;
        Ok(Box::new(client))
    }
}

/// Normalize a server URL so it always ends in `/api` without a trailing slash
pub fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config {
            message: "remote URL is empty".to_string(),
            key: Some("remote.url".to_string()),
        });
    }

    url::Url::parse(trimmed).map_err(|e| Error::Config {
        message: format!("invalid remote URL '{}': {}", url, e),
        key: Some("remote.url".to_string()),
    })?;

    if trimmed.ends_with("/api") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/api", trimmed))
    }
}

#[cfg(test)]
mod tests;
