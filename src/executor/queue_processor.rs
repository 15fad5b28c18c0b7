//! Dispatch loop: pulls requests off the queue, runs the matching engine and bridges the
//! outcome into the task record.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Error, Result, TaskFailure};
use crate::types::{TaskId, TaskKind, TaskOutput, TaskRequest, TaskStatus};

use super::{RunningTask, TaskExecutor};
use super::download_task::{self, DownloadTaskContext};
use super::progress::ProgressTracker;
use super::resize_task::{self, ResizeTaskContext};

impl TaskExecutor {
    /// Start the dispatch loop and restore leftover tasks
    ///
    /// Records left InProgress by a previous process are failed before the loop is
    /// spawned, so they can never be confused with tasks this executor runs. Pending
    /// records that are not already queued are then re-enqueued (see
    /// [`restore_tasks`](Self::restore_tasks)). The loop runs until
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns an error if the executor was already started or restoring fails.
    pub async fn start(&self) -> Result<()> {
        let mut receiver_slot = self.queue_state.receiver.lock().await;
        let Some(receiver) = receiver_slot.take() else {
            return Err(Error::Other("executor already started".to_string()));
        };
        if let Err(e) = self.fail_interrupted_tasks().await {
            *receiver_slot = Some(receiver);
            return Err(e);
        }
        drop(receiver_slot);

        let executor = self.clone();
        let handle = tokio::spawn(async move {
            executor.run_dispatch_loop(receiver).await;
        });
        *self.queue_state.dispatch_handle.lock().await = Some(handle);
        tracing::info!("task executor started");

        self.requeue_pending().await?;
        Ok(())
    }

    async fn run_dispatch_loop(&self, mut receiver: mpsc::Receiver<TaskRequest>) {
        let shutdown = self.queue_state.shutdown_token.clone();

        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = receiver.recv() => match received {
                    Some(request) => request,
                    None => break,
                },
            };

            self.dispatch(request).await;
        }

        receiver.close();
        let mut left_behind = 0usize;
        while receiver.try_recv().is_ok() {
            left_behind += 1;
        }
        if left_behind > 0 {
            tracing::info!(
                count = left_behind,
                "queued tasks left pending, they will be restored on next start"
            );
        }
        tracing::info!("dispatch loop stopped");
    }

    /// Run one request to completion and record its outcome
    async fn dispatch(&self, request: TaskRequest) {
        let task_id = request.task_id().clone();
        let kind = request.kind();

        let claimed = self.claim(&task_id).await;
        self.queue_state.queued.lock().await.remove(&task_id);
        if !claimed {
            return;
        }
        tracing::info!(task_id = %task_id, kind = %kind.as_str(), "task started");
        self.notifier.task_update(
            &task_id,
            kind,
            TaskStatus::InProgress,
            Some("started".to_string()),
            Some(0),
            None,
        );

        let cancel_token = self.queue_state.shutdown_token.child_token();
        self.queue_state
            .active_tasks
            .lock()
            .await
            .insert(task_id.clone(), cancel_token.clone());

        let progress = Arc::new(ProgressTracker::new(
            task_id.clone(),
            kind,
            Arc::clone(&self.db),
            self.notifier.clone(),
        ));

        let (handle, partial_output) = match request {
            TaskRequest::Download {
                album_id,
                album_name,
                ..
            } => {
                let partial_output = download_task::archive_path_for(&self.config, &album_id, &task_id);
                let ctx = DownloadTaskContext {
                    album_id,
                    album_name,
                    db: Arc::clone(&self.db),
                    config: Arc::clone(&self.config),
                    remote: Arc::clone(&self.remote),
                    source_factory: Arc::clone(&self.services.source_factory),
                    progress,
                    cancel_token,
                };
                (tokio::spawn(download_task::run_download_task(ctx)), partial_output)
            }
            TaskRequest::Resize {
                downloaded_album_id,
                profile_id,
                ..
            } => {
                let ctx = ResizeTaskContext {
                    downloaded_album_id,
                    profile_id,
                    db: Arc::clone(&self.db),
                    config: Arc::clone(&self.config),
                    resizer: Arc::clone(&self.services.resizer),
                    progress,
                    cancel_token,
                };
                (
                    tokio::spawn(resize_task::run_resize_task(ctx)),
                    resize_task::output_path_for(&self.config, &task_id),
                )
            }
        };
        *self.queue_state.running.lock().await = Some(RunningTask {
            task_id: task_id.clone(),
            kind,
            abort: handle.abort_handle(),
            partial_output,
        });

        // A panicking engine surfaces here as a JoinError instead of killing the loop
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(TaskFailure::Failed(describe_join_error(join_error))),
        };

        self.queue_state.running.lock().await.take();
        self.queue_state.active_tasks.lock().await.remove(&task_id);
        self.record_outcome(&task_id, kind, outcome).await;
    }

    /// Move a Pending record to InProgress; false means the request is skipped
    async fn claim(&self, task_id: &TaskId) -> bool {
        match self.db.get_task(task_id).await {
            Ok(Some(record)) if record.status() == TaskStatus::Pending => {}
            Ok(Some(record)) => {
                tracing::warn!(
                    task_id = %task_id,
                    status = %record.status(),
                    "task is not pending - skipping"
                );
                return false;
            }
            Ok(None) => {
                tracing::warn!(task_id = %task_id, "task record not found - skipping");
                return false;
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "failed to load task record - skipping");
                return false;
            }
        }

        match self.db.transition_status(task_id, TaskStatus::InProgress, None).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(task_id = %task_id, "task left pending state before dispatch - skipping");
                false
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "failed to mark task in progress");
                false
            }
        }
    }

    pub(super) async fn record_outcome(
        &self,
        task_id: &TaskId,
        kind: TaskKind,
        outcome: std::result::Result<TaskOutput, TaskFailure>,
    ) {
        let (status, error_message) = match &outcome {
            Ok(output) => {
                tracing::info!(
                    task_id = %task_id,
                    processed = output.processed_count,
                    archive = %output.archive_path.display(),
                    size_bytes = output.size_bytes,
                    "task completed"
                );
                (TaskStatus::Completed, None)
            }
            Err(TaskFailure::Cancelled) => {
                tracing::info!(task_id = %task_id, "task cancelled");
                (TaskStatus::Error, Some(TaskFailure::Cancelled.to_string()))
            }
            Err(TaskFailure::Failed(message)) => {
                tracing::error!(task_id = %task_id, error = %message, "task failed");
                (TaskStatus::Error, Some(message.clone()))
            }
        };

        match self
            .db
            .transition_status(task_id, status, error_message.as_deref())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(task_id = %task_id, status = %status, "task record changed underneath, final status not stored");
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "failed to store final task status");
            }
        }

        let processed = outcome.as_ref().ok().map(|output| output.processed_count);
        self.notifier
            .task_update(task_id, kind, status, error_message, processed, None);
    }
}

fn describe_join_error(error: tokio::task::JoinError) -> String {
    if error.is_cancelled() {
        return super::lifecycle::ABORTED.to_string();
    }

    let payload = error.into_panic();
    let detail = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    format!("task panicked: {}", detail)
}
