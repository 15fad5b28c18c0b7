//! Shared test helpers: in-memory remote server, mock resizer and executor setup.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{TempDir, tempdir};
use tokio::sync::broadcast;

use crate::config::{Config, RemoteConfig};
use crate::db::Database;
use crate::error::{Error, RemoteError, Result};
use crate::remote::{AssetSource, AssetSourceFactory};
use crate::resize::{ImageResizer, ResizeOutcome, ResizeTarget};
use crate::types::{
    AlbumInfo, AlbumSummary, AssetRef, Event, MediaType, Orientation, TaskId, TaskStatus,
};

use super::TaskExecutor;

pub(crate) const ALBUM_ID: &str = "album-1";
pub(crate) const ALBUM_NAME: &str = "Holidays";

/// How the mock server answers the connectivity probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeMode {
    Ok,
    Unreachable,
    Unauthorized,
}

/// In-memory remote server shared by every client the mock factory creates
pub(crate) struct MockRemote {
    assets: StdMutex<Vec<AssetRef>>,
    failing: StdMutex<HashSet<String>>,
    probe_mode: StdMutex<ProbeMode>,
    fetch_delay: StdMutex<Duration>,
    panic_on_listing: AtomicBool,
    pub(crate) probe_calls: AtomicU32,
    pub(crate) fetch_calls: AtomicU32,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl MockRemote {
    /// Server whose album holds `ids`, each named `<id>.jpg`
    pub(crate) fn with_assets(ids: &[&str]) -> Arc<Self> {
        let remote = Arc::new(Self {
            assets: StdMutex::new(Vec::new()),
            failing: StdMutex::new(HashSet::new()),
            probe_mode: StdMutex::new(ProbeMode::Ok),
            fetch_delay: StdMutex::new(Duration::ZERO),
            panic_on_listing: AtomicBool::new(false),
            probe_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        remote.set_assets(ids);
        remote
    }

    /// Server with `count` image assets `asset-000`, `asset-001`, ...
    pub(crate) fn with_numbered_assets(count: usize) -> Arc<Self> {
        let ids: Vec<String> = (0..count).map(asset_id).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Self::with_assets(&refs)
    }

    pub(crate) fn set_assets(&self, ids: &[&str]) {
        *self.assets.lock().unwrap() = ids
            .iter()
            .map(|id| AssetRef {
                id: id.to_string(),
                original_filename: format!("{}.jpg", id),
                media_type: MediaType::Image,
            })
            .collect();
    }

    pub(crate) fn push_asset(&self, asset: AssetRef) {
        self.assets.lock().unwrap().push(asset);
    }

    pub(crate) fn fail_fetch(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub(crate) fn heal_fetch(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    pub(crate) fn set_probe_mode(&self, mode: ProbeMode) {
        *self.probe_mode.lock().unwrap() = mode;
    }

    pub(crate) fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub(crate) fn panic_on_listing(&self) {
        self.panic_on_listing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fetches(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn probes(&self) -> u32 {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn asset_id(index: usize) -> String {
    format!("asset-{:03}", index)
}

pub(crate) fn asset_bytes(id: &str) -> Vec<u8> {
    format!("bytes-of-{}", id).into_bytes()
}

struct MockClient {
    remote: Arc<MockRemote>,
}

#[async_trait]
impl AssetSource for MockClient {
    async fn probe(&self) -> Result<()> {
        self.remote.probe_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.remote.probe_mode.lock().unwrap();
        match mode {
            ProbeMode::Ok => Ok(()),
            ProbeMode::Unreachable => Err(Error::Remote(RemoteError::Unreachable(
                "connection refused".into(),
            ))),
            ProbeMode::Unauthorized => Err(Error::Remote(RemoteError::Unauthorized)),
        }
    }

    async fn list_albums(&self) -> Result<Vec<AlbumSummary>> {
        let count = self.remote.assets.lock().unwrap().len() as u64;
        Ok(vec![AlbumSummary {
            id: ALBUM_ID.into(),
            name: ALBUM_NAME.into(),
            asset_count: count,
        }])
    }

    async fn album_info(&self, album_id: &str) -> Result<AlbumInfo> {
        if self.remote.panic_on_listing.load(Ordering::SeqCst) {
            panic!("listing exploded");
        }
        if album_id != ALBUM_ID {
            return Err(Error::Remote(RemoteError::HttpStatus {
                status: 404,
                context: "fetching album".into(),
            }));
        }
        Ok(AlbumInfo {
            id: ALBUM_ID.into(),
            name: ALBUM_NAME.into(),
            assets: self.remote.assets.lock().unwrap().clone(),
        })
    }

    async fn fetch_asset_bytes(&self, asset_id: &str) -> Result<Vec<u8>> {
        self.remote.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.remote.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.remote.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.remote.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.remote.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.remote.failing.lock().unwrap().contains(asset_id) {
            return Err(Error::Remote(RemoteError::HttpStatus {
                status: 500,
                context: format!("fetching asset {}", asset_id),
            }));
        }
        Ok(asset_bytes(asset_id))
    }
}

/// Factory handing out clients of one [`MockRemote`]
pub(crate) struct MockFactory {
    pub(crate) remote: Arc<MockRemote>,
}

impl AssetSourceFactory for MockFactory {
    fn create(&self, _settings: &RemoteConfig) -> Result<Box<dyn AssetSource>> {
        Ok(Box::new(MockClient {
            remote: Arc::clone(&self.remote),
        }))
    }
}

/// Resizer that never decodes anything
///
/// Bytes starting with `corrupt` fail, bytes starting with `tall` are vertical, all
/// other bytes are horizontal. Output is `jpeg:` + input.
pub(crate) struct MockResizer;

impl ImageResizer for MockResizer {
    fn resize(&self, bytes: &[u8], target: &ResizeTarget) -> Result<ResizeOutcome> {
        if bytes.starts_with(b"corrupt") {
            return Err(Error::Image("failed to decode image: corrupt".into()));
        }
        let orientation = if bytes.starts_with(b"tall") {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        };
        if !target.accepts(orientation) {
            return Ok(ResizeOutcome::Skipped(orientation));
        }

        let mut out = b"jpeg:".to_vec();
        out.extend_from_slice(bytes);
        Ok(ResizeOutcome::Resized(out))
    }
}

/// Config rooted in `dir` with millisecond retry delays
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.remote = Some(RemoteConfig::new("http://photos.invalid", "test-key"));
    config.persistence.database_path = dir.join("test.db");
    config.download.archive_dir = dir.join("archives");
    config.download.output_dir = dir.join("resized");
    config.download.shutdown_timeout = Duration::from_secs(5);
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(4);
    config
}

/// Executor over `config` talking to `remote`, not started
pub(crate) async fn create_executor_with(
    config: Config,
    remote: Arc<MockRemote>,
    resizer: Arc<dyn ImageResizer>,
) -> TaskExecutor {
    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();
    TaskExecutor::with_components(config, Arc::new(db), Arc::new(MockFactory { remote }), resizer)
        .await
        .unwrap()
}

/// Helper to create a test executor with a persistent database.
/// Returns the executor and the tempdir (which must be kept alive).
pub(crate) async fn create_test_executor(remote: Arc<MockRemote>) -> (TaskExecutor, TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let executor = create_executor_with(config, remote, Arc::new(MockResizer)).await;
    (executor, temp_dir)
}

/// Collect events for `task_id` until it reaches a terminal status
///
/// Returns every TaskUpdate seen for the task, the terminal one last.
pub(crate) async fn collect_until_terminal(
    events: &mut broadcast::Receiver<Event>,
    task_id: &TaskId,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let deadline = Duration::from_secs(15);

    tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Event::TaskUpdate {
                        task_id: id,
                        status,
                        ..
                    } = &event
                    else {
                        continue;
                    };
                    if id != task_id {
                        continue;
                    }
                    let terminal = status.is_terminal();
                    seen.push(event);
                    if terminal {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    panic!("test subscriber lagged by {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("task did not reach a terminal status in time");

    seen
}

/// Status and error message of the terminal event
pub(crate) fn terminal_state(events: &[Event]) -> (TaskStatus, Option<String>) {
    match events.last() {
        Some(Event::TaskUpdate {
            status, message, ..
        }) => (*status, message.clone()),
        other => panic!("expected a task update, got {:?}", other),
    }
}

/// Every progress value reported while the task was running
pub(crate) fn progress_values(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::TaskUpdate {
                status: TaskStatus::InProgress,
                progress: Some(progress),
                ..
            } => Some(*progress),
            _ => None,
        })
        .collect()
}

/// Every step message reported while the task was running
pub(crate) fn step_messages(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::TaskUpdate {
                status: TaskStatus::InProgress,
                message: Some(message),
                ..
            } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

/// Names of the entries of a ZIP archive, in order
pub(crate) fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}
