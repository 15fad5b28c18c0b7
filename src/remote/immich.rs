use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;

use super::{AssetSource, normalize_base_url};
use crate::config::RemoteConfig;
use crate::error::{Error, RemoteError, Result};
use crate::types::{AlbumInfo, AlbumSummary};

/// HTTP client for an Immich-compatible server
///
/// Authenticates with the `x-api-key` header. All requests share one connection pool
/// and the per-request timeout from [`RemoteConfig::timeout`].
#[derive(Clone, Debug)]
pub struct ImmichClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PingResponse {
    res: String,
}

impl ImmichClient {
    /// Build a client for `settings`
    pub fn new(settings: &RemoteConfig) -> Result<Self> {
        let base_url = normalize_base_url(&settings.url)?;

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&settings.api_key).map_err(|e| Error::Config {
            message: format!("API key is not a valid header value: {}", e),
            key: Some("remote.api_key".to_string()),
        })?;
        headers.insert("x-api-key", api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    /// Normalized base URL (always ends in `/api`)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, context: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");

        let response = self.http.get(&url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("{}: request timed out", context)
            } else {
                format!("{}: {}", context, e)
            };
            RemoteError::Unreachable(reason)
        })?;

        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::UNAUTHORIZED => Err(RemoteError::Unauthorized.into()),
            status => Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                context: context.to_string(),
            }
            .into()),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, context: &str) -> Result<T> {
        let response = self.get(path, context).await?;
        response.json::<T>().await.map_err(|e| {
            RemoteError::UnexpectedResponse(format!("{}: {}", context, e)).into()
        })
    }
}

#[async_trait]
impl AssetSource for ImmichClient {
    async fn probe(&self) -> Result<()> {
        let ping: PingResponse = self
            .get_json("/server-info/ping", "connecting to server")
            .await?;

        if ping.res == "pong" {
            Ok(())
        } else {
            Err(RemoteError::UnexpectedResponse(format!("ping answered '{}'", ping.res)).into())
        }
    }

    async fn list_albums(&self) -> Result<Vec<AlbumSummary>> {
        self.get_json("/albums", "fetching albums").await
    }

    async fn album_info(&self, album_id: &str) -> Result<AlbumInfo> {
        self.get_json(&format!("/albums/{}", album_id), "fetching album")
            .await
    }

    async fn fetch_asset_bytes(&self, asset_id: &str) -> Result<Vec<u8>> {
        let response = self
            .get(&format!("/assets/{}/original", asset_id), "downloading asset")
            .await?;

        let bytes = response.bytes().await.map_err(|e| {
            RemoteError::Unreachable(format!("reading asset {}: {}", asset_id, e))
        })?;
        Ok(bytes.to_vec())
    }
}
