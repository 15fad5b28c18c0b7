//! Admission: enqueueing requests, creating records, restoring on start.

use crate::error::{Error, Result};
use crate::types::{TaskId, TaskRequest, TaskStatus};

use super::TaskExecutor;

impl TaskExecutor {
    /// Place a request onto the bounded queue
    ///
    /// Waits while the queue is full. Returns false once shutdown has closed the queue,
    /// including for callers that were already waiting for a free slot.
    ///
    /// The task record must already exist in Pending state; the dispatch loop skips
    /// requests whose record is missing. A request whose id is already waiting in the
    /// queue is not added a second time.
    pub async fn enqueue(&self, request: TaskRequest) -> bool {
        let sender = {
            let guard = self.queue_state.sender.lock().await;
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => return false,
            }
        };

        let task_id = request.task_id().clone();
        if !self.queue_state.queued.lock().await.insert(task_id.clone()) {
            tracing::debug!(task_id = %task_id, "task already queued");
            return true;
        }

        let accepted = tokio::select! {
            biased;
            _ = self.queue_state.shutdown_token.cancelled() => false,
            sent = sender.send(request) => sent.is_ok(),
        };

        if accepted {
            tracing::debug!(task_id = %task_id, "task enqueued");
        } else {
            self.queue_state.queued.lock().await.remove(&task_id);
            tracing::warn!(task_id = %task_id, "queue closed, request rejected");
        }
        accepted
    }

    /// Create a Pending download record with a generated id and enqueue it
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] if the queue is closed. The record then stays
    /// Pending and is picked up by [`restore_tasks`](Self::restore_tasks) on the next
    /// start.
    pub async fn submit_download(
        &self,
        album_id: impl Into<String>,
        album_name: impl Into<String>,
    ) -> Result<TaskId> {
        let request = TaskRequest::Download {
            task_id: TaskId::generate(),
            album_id: album_id.into(),
            album_name: album_name.into(),
        };
        self.submit(request).await
    }

    /// Create a Pending resize record with a generated id and enqueue it
    ///
    /// # Errors
    ///
    /// Same as [`submit_download`](Self::submit_download).
    pub async fn submit_resize(&self, downloaded_album_id: i64, profile_id: i64) -> Result<TaskId> {
        let request = TaskRequest::Resize {
            task_id: TaskId::generate(),
            downloaded_album_id,
            profile_id,
        };
        self.submit(request).await
    }

    async fn submit(&self, request: TaskRequest) -> Result<TaskId> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let task_id = request.task_id().clone();
        self.db.create_task(&request).await?;
        tracing::info!(task_id = %task_id, kind = %request.kind().as_str(), "task created");

        if self.enqueue(request).await {
            Ok(task_id)
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Recover task records left behind by a previous process
    ///
    /// Records still InProgress were interrupted mid-run and are moved to Error with
    /// "interrupted by shutdown", unless the dispatch loop is already running (the
    /// records are then this executor's own). Pending records not already in the queue
    /// are re-enqueued in creation order. Returns the ids that were re-enqueued.
    ///
    /// Called automatically by [`start`](Self::start). Before `start`, at most
    /// `download.queue_capacity` records can be re-enqueued without blocking.
    pub async fn restore_tasks(&self) -> Result<Vec<TaskId>> {
        if self.queue_state.dispatch_handle.lock().await.is_none() {
            self.fail_interrupted_tasks().await?;
        } else {
            tracing::debug!("dispatch loop running, in-progress records left alone");
        }
        self.requeue_pending().await
    }

    /// Move InProgress records to Error; only valid while no engine of this executor runs
    pub(super) async fn fail_interrupted_tasks(&self) -> Result<u64> {
        let interrupted = self.db.fail_in_progress_tasks("interrupted by shutdown").await?;
        if interrupted > 0 {
            tracing::warn!(count = interrupted, "marked interrupted tasks as failed");
        }
        Ok(interrupted)
    }

    /// Enqueue Pending records that are not already waiting in the queue
    pub(super) async fn requeue_pending(&self) -> Result<Vec<TaskId>> {
        tracing::info!("Restoring tasks from database");

        let pending = self.db.list_tasks_by_status(TaskStatus::Pending).await?;
        if pending.is_empty() {
            tracing::info!("No pending tasks to restore");
            return Ok(Vec::new());
        }

        let mut restored = Vec::with_capacity(pending.len());
        for record in pending {
            if self.queue_state.queued.lock().await.contains(&record.id) {
                tracing::debug!(task_id = %record.id, "pending task already queued");
                continue;
            }
            let Some(request) = record.request() else {
                tracing::warn!(
                    task_id = %record.id,
                    kind = %record.kind,
                    "pending task has incomplete inputs - skipping"
                );
                continue;
            };

            if !self.enqueue(request).await {
                tracing::warn!("queue closed during restore, remaining tasks stay pending");
                break;
            }
            restored.push(record.id);
        }

        tracing::info!(restored_count = restored.len(), "Task restoration complete");
        Ok(restored)
    }
}
