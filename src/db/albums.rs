//! Downloaded albums and the archives each download run appends.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{AlbumArchive, Database, DownloadedAlbum, NewAlbumArchive};

const ALBUM_COLUMNS: &str = r#"
    id, album_id, album_name, photo_count, total_size, archive_count,
    last_synced_at, created_at
"#;

fn query_failed(what: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("Failed to {}: {}", what, e)))
}

impl Database {
    /// Record the archive of one download run against its album
    ///
    /// Creates the downloaded-album row on first sync and updates it in place
    /// afterwards, so its id stays stable. Photo count is recomputed from the local asset
    /// records; size and archive count from the album's archives. Returns the
    /// downloaded-album id.
    pub async fn record_album_archive(&self, archive: &NewAlbumArchive) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO downloaded_albums (album_id, album_name, last_synced_at, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(album_id) DO UPDATE SET
                album_name = excluded.album_name,
                last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(&archive.album_id)
        .bind(&archive.album_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed("upsert downloaded album", e))?;

        let album_db_id: i64 =
            sqlx::query_scalar("SELECT id FROM downloaded_albums WHERE album_id = ?")
                .bind(&archive.album_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| query_failed("look up downloaded album", e))?;

        sqlx::query(
            r#"
            INSERT INTO album_archives (
                downloaded_album_id, archive_path, photo_count, size_bytes, created_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(album_db_id)
        .bind(archive.archive_path.to_string_lossy().as_ref())
        .bind(archive.photo_count as i64)
        .bind(archive.size_bytes as i64)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed("insert album archive", e))?;

        sqlx::query(
            r#"
            UPDATE downloaded_albums SET
                photo_count = (SELECT COUNT(*) FROM local_assets WHERE album_id = ?),
                total_size = (
                    SELECT COALESCE(SUM(size_bytes), 0) FROM album_archives
                    WHERE downloaded_album_id = ?
                ),
                archive_count = (
                    SELECT COUNT(*) FROM album_archives WHERE downloaded_album_id = ?
                )
            WHERE id = ?
            "#,
        )
        .bind(&archive.album_id)
        .bind(album_db_id)
        .bind(album_db_id)
        .bind(album_db_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed("update downloaded album totals", e))?;

        tx.commit()
            .await
            .map_err(|e| query_failed("commit album archive", e))?;

        Ok(album_db_id)
    }

    /// Get a downloaded album by its database id
    pub async fn get_downloaded_album(&self, id: i64) -> Result<Option<DownloadedAlbum>> {
        let sql = format!("SELECT {} FROM downloaded_albums WHERE id = ?", ALBUM_COLUMNS);
        sqlx::query_as::<_, DownloadedAlbum>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("get downloaded album", e))
    }

    /// Get a downloaded album by its remote album id
    pub async fn find_downloaded_album(&self, album_id: &str) -> Result<Option<DownloadedAlbum>> {
        let sql = format!(
            "SELECT {} FROM downloaded_albums WHERE album_id = ?",
            ALBUM_COLUMNS
        );
        sqlx::query_as::<_, DownloadedAlbum>(&sql)
            .bind(album_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("find downloaded album", e))
    }

    /// List downloaded albums, most recently synced first
    pub async fn list_downloaded_albums(&self) -> Result<Vec<DownloadedAlbum>> {
        let sql = format!(
            "SELECT {} FROM downloaded_albums ORDER BY last_synced_at DESC, id DESC",
            ALBUM_COLUMNS
        );
        sqlx::query_as::<_, DownloadedAlbum>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list downloaded albums", e))
    }

    /// Archives of a downloaded album, oldest first
    pub async fn list_album_archives(&self, downloaded_album_id: i64) -> Result<Vec<AlbumArchive>> {
        sqlx::query_as::<_, AlbumArchive>(
            r#"
            SELECT id, downloaded_album_id, archive_path, photo_count, size_bytes, created_at
            FROM album_archives
            WHERE downloaded_album_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(downloaded_album_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list album archives", e))
    }

    /// Delete a downloaded album and its archive rows
    ///
    /// Files on disk and local asset records are left alone. Returns true if a row was
    /// deleted.
    pub async fn delete_downloaded_album(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM downloaded_albums WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete downloaded album", e))?;

        Ok(result.rows_affected() > 0)
    }
}
