//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Foreign keys cascade album archives; WAL lets readers run during task writes
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: Create initial schema
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            Self::create_tasks_schema(conn).await?;
            Self::create_local_assets_table(conn).await?;
            Self::create_albums_schema(conn).await?;
            Self::create_resize_profiles_table(conn).await?;
            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v1: {}",
                            e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    async fn execute_ddl(conn: &mut SqliteConnection, sql: &str, what: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create {}: {}",
                what, e
            )))
        })?;
        Ok(())
    }

    /// Create tasks table and its indexes
    async fn create_tasks_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE tasks (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                progress INTEGER NOT NULL DEFAULT 0,
                total INTEGER NOT NULL DEFAULT 0,
                current_step TEXT,
                error_message TEXT,
                album_id TEXT,
                album_name TEXT,
                downloaded_album_id INTEGER,
                profile_id INTEGER,
                output_path TEXT,
                output_size INTEGER,
                processed_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER
            )
            "#,
            "tasks table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_tasks_status ON tasks(status, created_at)",
            "index",
        )
        .await
    }

    /// Create local_assets table
    async fn create_local_assets_table(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE local_assets (
                album_id TEXT NOT NULL,
                asset_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                downloaded_at INTEGER NOT NULL,
                PRIMARY KEY (album_id, asset_id)
            )
            "#,
            "local_assets table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_local_assets_task ON local_assets(task_id)",
            "local_assets task index",
        )
        .await
    }

    /// Create downloaded_albums, album_archives and remote_albums tables
    async fn create_albums_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE downloaded_albums (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                album_id TEXT NOT NULL UNIQUE,
                album_name TEXT NOT NULL,
                photo_count INTEGER NOT NULL DEFAULT 0,
                total_size INTEGER NOT NULL DEFAULT 0,
                archive_count INTEGER NOT NULL DEFAULT 0,
                last_synced_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            "downloaded_albums table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE album_archives (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                downloaded_album_id INTEGER NOT NULL
                    REFERENCES downloaded_albums(id) ON DELETE CASCADE,
                archive_path TEXT NOT NULL,
                photo_count INTEGER NOT NULL DEFAULT 0,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
            "album_archives table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_album_archives_album ON album_archives(downloaded_album_id)",
            "index",
        )
        .await?;

        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE remote_albums (
                album_id TEXT PRIMARY KEY,
                album_name TEXT NOT NULL,
                asset_count INTEGER NOT NULL DEFAULT 0,
                synced_at INTEGER NOT NULL
            )
            "#,
            "remote_albums table",
        )
        .await
    }

    /// Create resize_profiles table
    async fn create_resize_profiles_table(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE resize_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                include_horizontal INTEGER NOT NULL DEFAULT 1,
                include_vertical INTEGER NOT NULL DEFAULT 1,
                quality INTEGER NOT NULL DEFAULT 85,
                created_at INTEGER NOT NULL
            )
            "#,
            "resize_profiles table",
        )
        .await
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
