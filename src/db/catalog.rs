//! Album catalog: the albums the remote server listed at the last refresh.

use std::collections::HashMap;

use crate::error::DatabaseError;
use crate::types::AlbumSummary;
use crate::{Error, Result};

use super::{CatalogAlbum, CatalogStats, Database};

fn query_failed(what: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("Failed to {}: {}", what, e)))
}

impl Database {
    /// Replace the album catalog with `albums`
    ///
    /// Albums no longer listed by the server are dropped. Runs in one transaction.
    /// Returns the number of albums stored.
    pub async fn replace_album_catalog(&self, albums: &[AlbumSummary]) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        sqlx::query("DELETE FROM remote_albums")
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("clear album catalog", e))?;

        let mut stored = 0;
        for album in albums {
            let result = sqlx::query(
                r#"
                INSERT OR REPLACE INTO remote_albums (album_id, album_name, asset_count, synced_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&album.id)
            .bind(&album.name)
            .bind(album.asset_count as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("store catalog album", e))?;
            stored += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("commit album catalog", e))?;

        Ok(stored)
    }

    /// Catalog albums ordered by name
    pub async fn list_album_catalog(&self) -> Result<Vec<CatalogAlbum>> {
        sqlx::query_as::<_, CatalogAlbum>(
            r#"
            SELECT album_id, album_name, asset_count, synced_at
            FROM remote_albums
            ORDER BY album_name COLLATE NOCASE, album_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list album catalog", e))
    }

    /// Album and asset totals of the catalog plus the number of downloaded albums
    pub async fn catalog_stats(&self) -> Result<CatalogStats> {
        let (album_count, asset_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(asset_count), 0) FROM remote_albums",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_failed("count catalog albums", e))?;

        let downloaded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloaded_albums")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_failed("count downloaded albums", e))?;

        Ok(CatalogStats {
            album_count: album_count as u64,
            asset_count: asset_count as u64,
            downloaded_album_count: downloaded as u64,
        })
    }

    /// Locally recorded photo count per remote album id
    pub async fn local_photo_counts(&self) -> Result<HashMap<String, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT album_id, COUNT(*) FROM local_assets GROUP BY album_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("count local photos", e))?;

        Ok(rows
            .into_iter()
            .map(|(album_id, count)| (album_id, count as u64))
            .collect())
    }
}
