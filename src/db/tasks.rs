//! Task record CRUD and guarded status transitions.

use crate::error::DatabaseError;
use crate::types::{TaskId, TaskOutput, TaskRequest, TaskStatus};
use crate::{Error, Result};

use super::{Database, TaskRecord};

const TASK_COLUMNS: &str = r#"
    id, kind, status, progress, total, current_step, error_message,
    album_id, album_name, downloaded_album_id, profile_id,
    output_path, output_size, processed_count,
    created_at, started_at, completed_at
"#;

fn query_failed(what: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("Failed to {}: {}", what, e)))
}

impl Database {
    /// Insert a Pending task record for `request`
    ///
    /// Fails with [`DatabaseError::ConstraintViolation`] if the id already exists.
    pub async fn create_task(&self, request: &TaskRequest) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let (album_id, album_name, downloaded_album_id, profile_id) = match request {
            TaskRequest::Download {
                album_id,
                album_name,
                ..
            } => (Some(album_id.as_str()), Some(album_name.as_str()), None, None),
            TaskRequest::Resize {
                downloaded_album_id,
                profile_id,
                ..
            } => (None, None, Some(*downloaded_album_id), Some(*profile_id)),
        };

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, kind, status, album_id, album_name,
                downloaded_album_id, profile_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.task_id())
        .bind(request.kind().as_str())
        .bind(TaskStatus::Pending.as_str())
        .bind(album_id)
        .bind(album_name)
        .bind(downloaded_album_id)
        .bind(profile_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "task {} already exists",
                    request.task_id()
                )))
            } else {
                query_failed("insert task", e)
            }
        })?;

        Ok(())
    }

    /// Get a task by id
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        sqlx::query_as::<_, TaskRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("get task", e))
    }

    /// List all tasks, oldest first
    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {} FROM tasks ORDER BY created_at ASC, rowid ASC",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, TaskRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list tasks", e))
    }

    /// List tasks with a specific status, oldest first
    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE status = ? ORDER BY created_at ASC, rowid ASC",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, TaskRecord>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list tasks by status", e))
    }

    /// Move a task to `to` if its current status is a legal predecessor
    ///
    /// Entering InProgress stamps `started_at`; entering Completed or Error stamps
    /// `completed_at` in the same statement. `error` is stored as the error message.
    ///
    /// Returns false (and changes nothing) if the task does not exist or the transition
    /// is not allowed from its current status.
    pub async fn transition_status(
        &self,
        id: &TaskId,
        to: TaskStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let from = to.predecessors();
        if from.is_empty() {
            return Ok(false);
        }

        let now = chrono::Utc::now().timestamp();
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE tasks SET
                status = ?,
                started_at = CASE WHEN ? THEN ? ELSE started_at END,
                completed_at = CASE WHEN ? THEN ? ELSE completed_at END,
                error_message = COALESCE(?, error_message)
            WHERE id = ? AND status IN ({})
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(to == TaskStatus::InProgress)
            .bind(now)
            .bind(to.is_terminal())
            .bind(now)
            .bind(error)
            .bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("transition task status", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Raise the progress counter (never lowers it)
    pub async fn update_progress(&self, id: &TaskId, progress: u64) -> Result<()> {
        sqlx::query("UPDATE tasks SET progress = MAX(progress, ?) WHERE id = ?")
            .bind(progress as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("update progress", e))?;

        Ok(())
    }

    /// Set the total number of items
    pub async fn set_total(&self, id: &TaskId, total: u64) -> Result<()> {
        sqlx::query("UPDATE tasks SET total = ? WHERE id = ?")
            .bind(total as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("set total", e))?;

        Ok(())
    }

    /// Set the human-readable current step
    pub async fn set_current_step(&self, id: &TaskId, step: &str) -> Result<()> {
        sqlx::query("UPDATE tasks SET current_step = ? WHERE id = ?")
            .bind(step)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("set current step", e))?;

        Ok(())
    }

    /// Store the output reference and processed count
    pub async fn set_output(&self, id: &TaskId, output: &TaskOutput) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET output_path = ?, output_size = ?, processed_count = ? WHERE id = ?",
        )
        .bind(output.archive_path.to_string_lossy().as_ref())
        .bind(output.size_bytes as i64)
        .bind(output.processed_count as i64)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("set task output", e))?;

        Ok(())
    }

    /// Delete a task record
    ///
    /// Returns true if a record was deleted. Output archives on disk are left alone.
    pub async fn delete_task(&self, id: &TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete task", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Move every InProgress task to Error with `message`
    ///
    /// Used at startup: anything still InProgress was running when the previous process
    /// exited. Returns the number of tasks changed.
    pub async fn fail_in_progress_tasks(&self, message: &str) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = ?, error_message = ?, completed_at = ?
            WHERE status = ?
            "#,
        )
        .bind(TaskStatus::Error.as_str())
        .bind(message)
        .bind(now)
        .bind(TaskStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("fail interrupted tasks", e))?;

        Ok(result.rows_affected())
    }
}
