//! Local asset records: which remote assets of an album are already downloaded.

use crate::error::DatabaseError;
use crate::types::TaskId;
use crate::{Error, Result};
use std::collections::HashSet;

use super::Database;

impl Database {
    /// Ids of every asset of `album_id` recorded as downloaded
    pub async fn list_local_asset_ids(&self, album_id: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT asset_id FROM local_assets WHERE album_id = ?")
                .bind(album_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list local assets: {}",
                        e
                    )))
                })?;

        Ok(ids.into_iter().collect())
    }

    /// Record an asset as downloaded by `task_id` (idempotent)
    ///
    /// An existing record keeps the task that first downloaded it.
    pub async fn add_local_asset(&self, album_id: &str, asset_id: &str, task_id: &TaskId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO local_assets (album_id, asset_id, task_id, downloaded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(album_id)
        .bind(asset_id)
        .bind(task_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to add local asset: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete the records of `asset_ids` in `album_id`
    ///
    /// Runs in one transaction. Returns the number of records deleted.
    pub async fn remove_local_assets(&self, album_id: &str, asset_ids: &[String]) -> Result<u64> {
        if asset_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let mut removed = 0;
        for asset_id in asset_ids {
            let result = sqlx::query("DELETE FROM local_assets WHERE album_id = ? AND asset_id = ?")
                .bind(album_id)
                .bind(asset_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to remove local asset: {}",
                        e
                    )))
                })?;
            removed += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit local asset removal: {}",
                e
            )))
        })?;

        Ok(removed)
    }

    /// Delete every record created by `task_id`, returning how many were deleted
    pub async fn remove_task_assets(&self, task_id: &TaskId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM local_assets WHERE task_id = ?")
            .bind(task_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove task assets: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Number of assets of `album_id` recorded as downloaded
    pub async fn count_local_assets(&self, album_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM local_assets WHERE album_id = ?")
            .bind(album_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count local assets: {}",
                    e
                )))
            })?;

        Ok(count as u64)
    }
}
