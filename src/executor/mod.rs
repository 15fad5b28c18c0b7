//! Task executor split into focused submodules.
//!
//! The `TaskExecutor` struct and its methods are organized by domain:
//! - [`queue`] - Admission: enqueue, submit helpers, restore on start
//! - [`queue_processor`] - Dispatch loop and status bridging
//! - [`lifecycle`] - Cancellation and graceful shutdown
//! - [`config_ops`] - Runtime remote settings
//! - [`catalog`] - Album catalog refresh from the remote server
//! - [`progress`] - Monotonic progress reporting shared by both engines
//! - [`download_task`] - Album download engine
//! - [`resize_task`] - Album resize engine

mod catalog;
mod config_ops;
mod download_task;
mod lifecycle;
mod progress;
mod queue;
mod queue_processor;
mod resize_task;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RemoteConfig};
use crate::db::Database;
use crate::error::Result;
use crate::notify::Notifier;
use crate::remote::{AssetSourceFactory, ImmichClientFactory};
use crate::resize::{ImageCrateResizer, ImageResizer};
use crate::types::{Event, TaskId, TaskKind, TaskRequest};

/// Queue and in-flight task state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Producer side of the bounded queue (None once shutdown has begun)
    pub(crate) sender: Arc<Mutex<Option<mpsc::Sender<TaskRequest>>>>,
    /// Consumer side, taken by the dispatch loop on start
    pub(crate) receiver: Arc<Mutex<Option<mpsc::Receiver<TaskRequest>>>>,
    /// Parent of every task's cancellation token
    pub(crate) shutdown_token: CancellationToken,
    /// Cancellation tokens of running tasks
    pub(crate) active_tasks: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    /// Ids sitting in the queue, not yet claimed by the dispatch loop
    pub(crate) queued: Arc<Mutex<HashSet<TaskId>>>,
    /// Engine task currently spawned by the dispatch loop
    pub(crate) running: Arc<Mutex<Option<RunningTask>>>,
    /// Dispatch loop handle, awaited by shutdown
    pub(crate) dispatch_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

/// Handle on the engine task, used to abort it when shutdown times out
pub(crate) struct RunningTask {
    pub(crate) task_id: TaskId,
    pub(crate) kind: TaskKind,
    pub(crate) abort: tokio::task::AbortHandle,
    /// Archive the engine writes; deleted if the engine is aborted
    pub(crate) partial_output: PathBuf,
}

/// Injected engine capabilities
#[derive(Clone)]
pub(crate) struct EngineServices {
    /// Builds the remote client for each download task
    pub(crate) source_factory: Arc<dyn AssetSourceFactory>,
    /// Resizes images for resize tasks
    pub(crate) resizer: Arc<dyn ImageResizer>,
}

/// Background task executor (cloneable - all fields are Arc-wrapped)
///
/// Owns a bounded single-consumer queue of [`TaskRequest`]s. One dispatch loop pulls a
/// request at a time, runs the matching engine in its own Tokio task, and bridges the
/// outcome into the task record and the event channel.
#[derive(Clone)]
pub struct TaskExecutor {
    /// Database instance for persistence
    /// Public so collaborators can read task records
    pub db: Arc<Database>,
    /// Event channel
    pub(crate) notifier: Notifier,
    /// Static configuration
    pub(crate) config: Arc<Config>,
    /// Runtime-mutable remote connection settings
    pub(crate) remote: Arc<RwLock<Option<RemoteConfig>>>,
    /// Queue and in-flight task state
    pub(crate) queue_state: QueueState,
    /// Injected engine capabilities
    pub(crate) services: EngineServices,
}

impl TaskExecutor {
    /// Create a new TaskExecutor with the default remote client and resizer
    ///
    /// Opens (or creates) the database, creates the archive and output directories and
    /// the queue. Nothing runs until [`start`](Self::start) is called.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;

        Self::with_components(
            config,
            Arc::new(db),
            Arc::new(ImmichClientFactory),
            Arc::new(ImageCrateResizer),
        )
        .await
    }

    /// Create a TaskExecutor with explicit dependencies
    pub async fn with_components(
        config: Config,
        db: Arc<Database>,
        source_factory: Arc<dyn AssetSourceFactory>,
        resizer: Arc<dyn ImageResizer>,
    ) -> Result<Self> {
        for dir in [&config.download.archive_dir, &config.download.output_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                crate::Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let (sender, receiver) = mpsc::channel(config.download.queue_capacity.max(1));
        let notifier = Notifier::new(config.persistence.event_buffer);
        let remote = Arc::new(RwLock::new(config.remote.clone()));

        let queue_state = QueueState {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver: Arc::new(Mutex::new(Some(receiver))),
            shutdown_token: CancellationToken::new(),
            active_tasks: Arc::new(Mutex::new(HashMap::new())),
            queued: Arc::new(Mutex::new(HashSet::new())),
            running: Arc::new(Mutex::new(None)),
            dispatch_handle: Arc::new(Mutex::new(None)),
        };

        Ok(Self {
            db,
            notifier,
            config: Arc::new(config),
            remote,
            queue_state,
            services: EngineServices {
                source_factory,
                resizer,
            },
        })
    }

    /// Subscribe to task events
    ///
    /// Each subscriber receives every event sent after subscribing. A subscriber that
    /// falls behind by more than `persistence.event_buffer` events gets
    /// `RecvError::Lagged` instead of slowing tasks down.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use album_dl::{Config, TaskExecutor};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let executor = TaskExecutor::new(Config::default()).await?;
    ///
    ///     let mut events = executor.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("{:?}", event);
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.notifier.subscribe()
    }

    /// Get the static configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.queue_state.shutdown_token.is_cancelled()
    }
}
