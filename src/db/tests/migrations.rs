use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_database_creation() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut conn = db.pool.acquire().await.unwrap();
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .unwrap();

    for table in [
        "album_archives",
        "downloaded_albums",
        "local_assets",
        "remote_albums",
        "resize_profiles",
        "schema_version",
        "tasks",
    ] {
        assert!(tables.contains(&table.to_string()), "missing table {}", table);
    }

    drop(conn);
    db.close().await;
}

#[tokio::test]
async fn test_reopening_does_not_rerun_migrations() {
    let temp_file = NamedTempFile::new().unwrap();

    let first = Database::new(temp_file.path()).await.unwrap();
    first.close().await;
    let db = Database::new(temp_file.path()).await.unwrap();

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);

    db.close().await;
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO album_archives (downloaded_album_id, archive_path, photo_count, size_bytes, created_at)
         VALUES (999, '/nowhere.zip', 0, 0, 0)",
    )
    .execute(db.pool())
    .await;
    assert!(result.is_err(), "archive row without album must be rejected");

    db.close().await;
}
