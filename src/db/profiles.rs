//! Resize profile CRUD operations.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, NewResizeProfile, ResizeProfile};

fn map_write_error(what: &str, name: &str, e: sqlx::Error) -> Error {
    if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
        Error::Database(DatabaseError::ConstraintViolation(format!(
            "resize profile '{}' already exists",
            name
        )))
    } else {
        Error::Database(DatabaseError::QueryFailed(format!(
            "Failed to {}: {}",
            what, e
        )))
    }
}

impl Database {
    /// Insert a resize profile, returning its id
    pub async fn add_resize_profile(&self, profile: &NewResizeProfile) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO resize_profiles (
                name, width, height, include_horizontal, include_vertical, quality, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.name)
        .bind(profile.width)
        .bind(profile.height)
        .bind(profile.include_horizontal)
        .bind(profile.include_vertical)
        .bind(profile.quality.min(100))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("insert resize profile", &profile.name, e))?;

        Ok(result.last_insert_rowid())
    }

    /// Get a resize profile by id
    pub async fn get_resize_profile(&self, id: i64) -> Result<Option<ResizeProfile>> {
        sqlx::query_as::<_, ResizeProfile>(
            r#"
            SELECT id, name, width, height, include_horizontal, include_vertical, quality
            FROM resize_profiles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get resize profile: {}",
                e
            )))
        })
    }

    /// List all resize profiles by name
    pub async fn list_resize_profiles(&self) -> Result<Vec<ResizeProfile>> {
        sqlx::query_as::<_, ResizeProfile>(
            r#"
            SELECT id, name, width, height, include_horizontal, include_vertical, quality
            FROM resize_profiles
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list resize profiles: {}",
                e
            )))
        })
    }

    /// Replace every field of an existing profile
    ///
    /// Returns false if no profile has that id.
    pub async fn update_resize_profile(&self, id: i64, profile: &NewResizeProfile) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE resize_profiles SET
                name = ?, width = ?, height = ?,
                include_horizontal = ?, include_vertical = ?, quality = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.name)
        .bind(profile.width)
        .bind(profile.height)
        .bind(profile.include_horizontal)
        .bind(profile.include_vertical)
        .bind(profile.quality.min(100))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("update resize profile", &profile.name, e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a resize profile
    pub async fn delete_resize_profile(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resize_profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete resize profile: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
