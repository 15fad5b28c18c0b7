//! Configuration types for album-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Remote photo server connection settings
///
/// Both fields are required for download tasks; a missing `remote` section makes every
/// download task fail with "remote server not configured".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Server base URL (with or without a trailing `/api`)
    pub url: String,

    /// API key sent in the `x-api-key` header
    pub api_key: String,

    /// Total timeout for a single HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Create settings with the default request timeout
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout: default_request_timeout(),
        }
    }
}

/// Download pipeline configuration (directories, chunking, concurrency, queue)
///
/// Groups settings related to how tasks are admitted and how album assets are fetched
/// and stored. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory that receives download archives (default: "./archives")
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Directory that receives resize output archives (default: "./resized")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of assets processed per chunk (default: 50)
    ///
    /// Cancellation is observed at chunk boundaries, so smaller chunks stop sooner.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum concurrent asset fetches within a download task (default: 5)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Capacity of the task queue (default: 100)
    ///
    /// Once this many requests are waiting, `enqueue` blocks until the dispatch loop
    /// frees a slot.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for the in-flight task (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            output_dir: default_output_dir(),
            chunk_size: default_chunk_size(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            queue_capacity: default_queue_capacity(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Retry configuration for the connectivity probe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 1000 ms)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Resize pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResizeConfig {
    /// Pad resized images onto a black canvas of exactly the target size (default: false)
    #[serde(default)]
    pub letterbox: bool,

    /// File extensions treated as images when reading source archives
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            letterbox: false,
            image_extensions: default_image_extensions(),
        }
    }
}

impl ResizeConfig {
    /// Whether `filename` has one of the configured image extensions (case-insensitive)
    pub fn is_image_name(&self, filename: &str) -> bool {
        let Some(ext) = std::path::Path::new(filename).extension() else {
            return false;
        };
        let ext = ext.to_string_lossy().to_lowercase();
        self.image_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./album-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Event broadcast buffer per subscriber (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Main configuration for [`TaskExecutor`](crate::TaskExecutor)
///
/// Every field has a default, so `Config::default()` plus a `remote` section is a
/// working setup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote photo server settings (None = not configured yet)
    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    /// Download pipeline settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Connectivity retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Resize pipeline settings
    #[serde(default)]
    pub resize: ResizeConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Error {
            Error::Config {
                message: message.to_string(),
                key: Some(key.to_string()),
            }
        }

        if self.download.chunk_size == 0 {
            return Err(invalid("download.chunk_size", "chunk size must be at least 1"));
        }
        if self.download.max_concurrent_fetches == 0 {
            return Err(invalid(
                "download.max_concurrent_fetches",
                "at least one concurrent fetch is required",
            ));
        }
        if self.download.queue_capacity == 0 {
            return Err(invalid(
                "download.queue_capacity",
                "queue capacity must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid(
                "retry.max_attempts",
                "at least one connection attempt is required",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(invalid(
                "retry.backoff_multiplier",
                "backoff multiplier must be >= 1.0",
            ));
        }
        if let Some(remote) = &self.remote {
            url::Url::parse(&remote.url)
                .map_err(|e| invalid("remote.url", &format!("invalid URL: {}", e)))?;
        }
        Ok(())
    }
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./archives")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./resized")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./album-dl.db")
}

fn default_chunk_size() -> usize {
    50
}

fn default_max_concurrent_fetches() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_event_buffer() -> usize {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_image_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
