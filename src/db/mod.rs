//! Database layer for album-dl
//!
//! Handles SQLite persistence for task records, local asset records, downloaded albums
//! and resize profiles.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`tasks`] - Task record CRUD and guarded status transitions
//! - [`assets`] - Local asset records ("already downloaded" markers)
//! - [`albums`] - Downloaded albums and their archives
//! - [`catalog`] - Albums listed by the remote server
//! - [`profiles`] - Resize profile CRUD

use crate::types::{TaskId, TaskKind, TaskRequest, TaskStatus};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod albums;
mod assets;
mod catalog;
mod migrations;
mod profiles;
mod tasks;

/// Task record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskRecord {
    /// Task id
    pub id: TaskId,
    /// Task kind ("download" or "resize")
    pub kind: String,
    /// Status ("pending", "in_progress", "completed", "error")
    pub status: String,
    /// Items processed so far
    pub progress: i64,
    /// Total items (0 until known)
    pub total: i64,
    /// Human-readable current step
    pub current_step: Option<String>,
    /// Failure message when status is "error"
    pub error_message: Option<String>,
    /// Remote album id (download tasks)
    pub album_id: Option<String>,
    /// Remote album name (download tasks)
    pub album_name: Option<String>,
    /// Downloaded album record id (resize tasks)
    pub downloaded_album_id: Option<i64>,
    /// Resize profile id (resize tasks)
    pub profile_id: Option<i64>,
    /// Output archive path
    pub output_path: Option<String>,
    /// Output archive size in bytes
    pub output_size: Option<i64>,
    /// Assets downloaded or images resized
    pub processed_count: i64,
    /// Unix timestamp when the record was created
    pub created_at: i64,
    /// Unix timestamp when the task started running
    pub started_at: Option<i64>,
    /// Unix timestamp when the task reached Completed or Error
    pub completed_at: Option<i64>,
}

impl TaskRecord {
    /// Parsed status
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_db_str(&self.status)
    }

    /// Parsed kind (None for an unknown value)
    pub fn kind(&self) -> Option<TaskKind> {
        TaskKind::from_db_str(&self.kind)
    }

    /// Rebuild the request this record was created from
    ///
    /// Returns None if the input references are incomplete.
    pub fn request(&self) -> Option<TaskRequest> {
        match self.kind()? {
            TaskKind::Download => Some(TaskRequest::Download {
                task_id: self.id.clone(),
                album_id: self.album_id.clone()?,
                album_name: self.album_name.clone().unwrap_or_default(),
            }),
            TaskKind::Resize => Some(TaskRequest::Resize {
                task_id: self.id.clone(),
                downloaded_album_id: self.downloaded_album_id?,
                profile_id: self.profile_id?,
            }),
        }
    }
}

/// Album known on the remote server, from the last catalog refresh
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CatalogAlbum {
    /// Remote album id
    pub album_id: String,
    /// Album name on the server
    pub album_name: String,
    /// Assets the server reported for the album
    pub asset_count: i64,
    /// Unix timestamp of the refresh that stored this row
    pub synced_at: i64,
}

/// Totals over the album catalog and the downloaded albums
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    /// Albums in the catalog
    pub album_count: u64,
    /// Sum of the catalog's asset counts
    pub asset_count: u64,
    /// Albums downloaded at least once
    pub downloaded_album_count: u64,
}

/// Downloaded album record from database
///
/// One row per remote album; re-syncing updates it in place.
#[derive(Debug, Clone, FromRow)]
pub struct DownloadedAlbum {
    /// Unique database ID (stable across re-syncs)
    pub id: i64,
    /// Remote album id
    pub album_id: String,
    /// Album name at the last sync
    pub album_name: String,
    /// Local asset records for this album after the last sync
    pub photo_count: i64,
    /// Sum of all archive sizes in bytes
    pub total_size: i64,
    /// Number of archives written for this album
    pub archive_count: i64,
    /// Unix timestamp of the last sync
    pub last_synced_at: i64,
    /// Unix timestamp of the first sync
    pub created_at: i64,
}

/// Archive written by one download run
#[derive(Debug, Clone, FromRow)]
pub struct AlbumArchive {
    /// Unique database ID
    pub id: i64,
    /// Downloaded album this archive belongs to
    pub downloaded_album_id: i64,
    /// Archive path on disk
    pub archive_path: String,
    /// Entries written by that run
    pub photo_count: i64,
    /// Archive size in bytes
    pub size_bytes: i64,
    /// Unix timestamp when the archive was recorded
    pub created_at: i64,
}

impl AlbumArchive {
    /// Archive path as a `PathBuf`
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.archive_path)
    }
}

/// Result of one download run, to be recorded against its album
#[derive(Debug, Clone)]
pub struct NewAlbumArchive {
    /// Remote album id
    pub album_id: String,
    /// Album name
    pub album_name: String,
    /// Archive written by the run
    pub archive_path: PathBuf,
    /// Entries written by the run
    pub photo_count: u64,
    /// Archive size in bytes
    pub size_bytes: u64,
}

/// New resize profile to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewResizeProfile {
    /// Unique display name
    pub name: String,
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Keep horizontal images
    pub include_horizontal: bool,
    /// Keep vertical images
    pub include_vertical: bool,
    /// JPEG quality (0-100)
    pub quality: u8,
}

impl NewResizeProfile {
    /// Profile including both orientations at the default quality (85)
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            include_horizontal: true,
            include_vertical: true,
            quality: 85,
        }
    }
}

/// Resize profile record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ResizeProfile {
    /// Unique database ID
    pub id: i64,
    /// Unique display name
    pub name: String,
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Keep horizontal images
    pub include_horizontal: bool,
    /// Keep vertical images
    pub include_vertical: bool,
    /// JPEG quality (0-100)
    pub quality: u8,
}

/// Database handle for album-dl
#[derive(Debug)]
pub struct Database {
    pool: SqlitePool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
