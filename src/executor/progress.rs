//! Per-task progress reporting shared by both engines.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::Database;
use crate::notify::Notifier;
use crate::types::{TaskId, TaskKind, TaskStatus};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    progress: u64,
    total: u64,
}

/// Persists and broadcasts progress for one running task
///
/// Increment, store write and broadcast happen under one lock, so subscribers and the
/// task record both observe a non-decreasing sequence even when chunk fetches finish
/// concurrently.
pub(crate) struct ProgressTracker {
    task_id: TaskId,
    kind: TaskKind,
    db: Arc<Database>,
    notifier: Notifier,
    counters: Mutex<Counters>,
}

impl ProgressTracker {
    pub(crate) fn new(task_id: TaskId, kind: TaskKind, db: Arc<Database>, notifier: Notifier) -> Self {
        Self {
            task_id,
            kind,
            db,
            notifier,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub(crate) fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Record the number of items this run will process
    pub(crate) async fn set_total(&self, total: u64) -> crate::Result<()> {
        let mut counters = self.counters.lock().await;
        counters.total = total;
        self.db.set_total(&self.task_id, total).await?;
        self.notifier.task_update(
            &self.task_id,
            self.kind,
            TaskStatus::InProgress,
            None,
            Some(counters.progress),
            Some(total),
        );
        Ok(())
    }

    /// Persist a human-readable step and broadcast it
    ///
    /// A failed store write is logged; the step text is informational.
    pub(crate) async fn report_step(&self, step: impl Into<String>) {
        let step = step.into();
        let counters = self.counters.lock().await;
        if let Err(e) = self.db.set_current_step(&self.task_id, &step).await {
            tracing::warn!(task_id = %self.task_id, error = %e, "failed to persist task step");
        }
        self.notifier.task_update(
            &self.task_id,
            self.kind,
            TaskStatus::InProgress,
            Some(step),
            Some(counters.progress),
            Some(counters.total),
        );
    }

    /// Broadcast a step without touching the store
    pub(crate) fn announce(&self, step: impl Into<String>) {
        self.notifier.task_update(
            &self.task_id,
            self.kind,
            TaskStatus::InProgress,
            Some(step.into()),
            None,
            None,
        );
    }

    /// Count one finished item, persist the new value and broadcast it
    ///
    /// Returns the new progress value.
    pub(crate) async fn advance(&self) -> u64 {
        let mut counters = self.counters.lock().await;
        counters.progress += 1;
        let progress = counters.progress;

        if let Err(e) = self.db.update_progress(&self.task_id, progress).await {
            tracing::warn!(task_id = %self.task_id, progress, error = %e, "failed to persist progress");
        }
        self.notifier.task_update(
            &self.task_id,
            self.kind,
            TaskStatus::InProgress,
            None,
            Some(progress),
            Some(counters.total),
        );

        progress
    }

    /// Current progress value
    pub(crate) async fn progress(&self) -> u64 {
        self.counters.lock().await.progress
    }
}
