//! Cancellation and graceful shutdown.

use crate::error::{Result, TaskFailure};
use crate::types::{Event, TaskId};

use super::{RunningTask, TaskExecutor};

/// Error message of a task whose engine was aborted at shutdown
pub(crate) const ABORTED: &str = "task aborted";

impl TaskExecutor {
    /// Cancel a running task
    ///
    /// Cancellation is cooperative: a download stops before its next chunk, a resize
    /// before its next image. The task ends in Error with "cancelled".
    ///
    /// Returns false if the task is not currently running (queued tasks are not
    /// affected).
    pub async fn cancel(&self, task_id: &TaskId) -> bool {
        let active = self.queue_state.active_tasks.lock().await;
        match active.get(task_id) {
            Some(token) => {
                tracing::info!(task_id = %task_id, "cancellation requested");
                token.cancel();
                true
            }
            None => {
                tracing::debug!(task_id = %task_id, "cancel requested for task that is not running");
                false
            }
        }
    }

    /// Gracefully shut down the executor
    ///
    /// 1. Closes the queue: new and blocked [`enqueue`](Self::enqueue) calls return false
    /// 2. Signals cancellation to the in-flight task
    /// 3. Waits for the dispatch loop to exit, bounded by `download.shutdown_timeout`.
    ///    On timeout the loop and the running engine are aborted, the engine's partial
    ///    output is removed and its task ends in Error with "task aborted".
    /// 4. Broadcasts [`Event::Shutdown`]
    ///
    /// Requests still queued stay Pending in the database. Calling shutdown again is a
    /// no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let sender = self.queue_state.sender.lock().await.take();
        if sender.is_none() {
            tracing::debug!("shutdown already performed");
            return Ok(());
        }
        drop(sender);
        tracing::info!("Initiating graceful shutdown");

        self.queue_state.shutdown_token.cancel();
        {
            let active = self.queue_state.active_tasks.lock().await;
            if !active.is_empty() {
                tracing::info!(active_count = active.len(), "signalled cancellation to running tasks");
            }
        }

        let handle = self.queue_state.dispatch_handle.lock().await.take();
        if let Some(mut handle) = handle {
            let shutdown_timeout = self.config.download.shutdown_timeout;
            match tokio::time::timeout(shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {
                    tracing::info!("dispatch loop drained");
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "dispatch loop ended abnormally");
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = shutdown_timeout.as_millis() as u64,
                        "Timeout waiting for running task, aborting dispatch loop"
                    );
                    handle.abort();
                    // The loop is parked on the engine's handle, so this returns promptly
                    let _ = handle.await;

                    let running = self.queue_state.running.lock().await.take();
                    if let Some(running) = running {
                        self.abandon(running).await;
                    }
                }
            }
        }

        self.notifier.broadcast(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Abort an engine that outlived the shutdown timeout and undo its partial work
    async fn abandon(&self, running: RunningTask) {
        let RunningTask {
            task_id,
            kind,
            abort,
            partial_output,
        } = running;

        abort.abort();
        self.queue_state.active_tasks.lock().await.remove(&task_id);
        tracing::warn!(task_id = %task_id, "aborted task that did not stop in time");

        match tokio::fs::remove_file(&partial_output).await {
            Ok(()) => {
                tracing::debug!(task_id = %task_id, archive = ?partial_output, "removed partial archive");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(task_id = %task_id, archive = ?partial_output, error = %e, "failed to remove partial archive");
            }
        }

        if let Err(e) = self.db.remove_task_assets(&task_id).await {
            tracing::warn!(task_id = %task_id, error = %e, "failed to roll back local asset records");
        }

        self.record_outcome(
            &task_id,
            kind,
            Err(TaskFailure::Failed(ABORTED.to_string())),
        )
        .await;
    }
}
