//! Retry logic with exponential backoff
//!
//! Used by the download engine to validate connectivity before touching an album.
//! Every attempt's error is kept so the final failure can say what went wrong each time.
//!
//! # Example
//!
//! ```no_run
//! use album_dl::retry::{IsRetryable, retry_with_backoff};
//! use album_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let result = retry_with_backoff(
//!     &config,
//!     |attempt, max| println!("attempt {attempt}/{max}"),
//!     || async { Ok::<_, MyError>(()) },
//! )
//! .await;
//! assert!(result.is_ok());
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, RemoteError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, 5xx answers) should return `true`.
/// Permanent failures (bad API key, missing configuration) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for RemoteError {
    fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Unreachable(_) => true,
            // Server-side trouble, rate limiting and gateway timeouts usually pass
            RemoteError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            RemoteError::NotConfigured
            | RemoteError::Unauthorized
            | RemoteError::UnexpectedResponse(_) => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Remote(e) => e.is_retryable(),
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Archive(_)
            | Error::Image(_)
            | Error::NotFound(_)
            | Error::ShuttingDown
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// All errors collected by a failed [`retry_with_backoff`] run, in attempt order
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// One error per attempt that was made
    pub errors: Vec<E>,
}

impl<E: std::fmt::Display> RetryFailure<E> {
    /// Number of attempts that were made before giving up
    pub fn attempts(&self) -> usize {
        self.errors.len()
    }

    /// The error from the final attempt
    pub fn last(&self) -> Option<&E> {
        self.errors.last()
    }

    /// `"attempt 1: ...; attempt 2: ..."`
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("attempt {}: {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `config.max_attempts` is the total number of attempts, including the first.
/// `on_attempt(n, max)` is called right before attempt `n` (1-based) starts, which is
/// where callers report "attempt n/max" progress. The delay before attempt `n + 1` is
/// `initial_delay * backoff_multiplier^(n - 1)`, capped at `max_delay`.
///
/// A non-retryable error stops immediately; the returned failure then holds fewer than
/// `max_attempts` errors.
pub async fn retry_with_backoff<F, Fut, T, E, N>(
    config: &RetryConfig,
    mut on_attempt: N,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    N: FnMut(u32, u32),
{
    let max_attempts = config.max_attempts.max(1);
    let mut errors = Vec::new();
    let mut delay = config.initial_delay;

    for attempt in 1..=max_attempts {
        on_attempt(attempt, max_attempts);

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                errors.push(e);

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, attempt, "Operation failed with non-retryable error");
                }
                errors.push(e);
                break;
            }
        }
    }

    Err(RetryFailure { errors })
}

/// Add random jitter to a delay
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
