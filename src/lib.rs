//! # album-dl
//!
//! Background task pipeline that downloads albums from an Immich-compatible photo server
//! into ZIP archives and resizes downloaded albums according to named profiles.
//!
//! ## Overview
//!
//! - **Queue-driven** - Callers submit typed task requests; one dispatch loop runs them
//! - **Incremental** - Only assets missing locally are fetched; deletions are reconciled
//! - **Observable** - Every task is a persisted record, and progress is broadcast as events
//! - **Library-first** - HTTP routing, auth and UI are left to the embedding application
//!
//! ## Quick Start
//!
//! ```no_run
//! use album_dl::{Config, RemoteConfig, TaskExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         remote: Some(RemoteConfig::new("https://photos.example.com", "api-key")),
//!         ..Default::default()
//!     };
//!
//!     let executor = TaskExecutor::new(config).await?;
//!
//!     let mut events = executor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     executor.start().await?;
//!     let task_id = executor.submit_download("album-id", "Holidays").await?;
//!     println!("queued {}", task_id);
//!
//!     album_dl::run_with_shutdown(executor).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// ZIP archive writing and reading
pub mod archive;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Task executor and the download/resize engines
pub mod executor;
/// Best-effort event broadcast
pub mod notify;
/// Remote photo server client
pub mod remote;
/// Pluggable image resizing
pub mod resize;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, RemoteConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, RemoteError, Result, TaskFailure};
pub use executor::TaskExecutor;
pub use notify::Notifier;
pub use remote::{AssetSource, AssetSourceFactory, ImmichClient};
pub use resize::{ImageCrateResizer, ImageResizer};
pub use types::{Event, TaskId, TaskKind, TaskOutput, TaskRequest, TaskStatus};

/// Wait for a termination signal, then shut the executor down gracefully.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to whichever can be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use album_dl::{Config, TaskExecutor, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let executor = TaskExecutor::new(Config::default()).await?;
///     executor.start().await?;
///
///     run_with_shutdown(executor).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(executor: TaskExecutor) -> Result<()> {
    wait_for_signal().await;
    executor.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
