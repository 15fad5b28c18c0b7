use crate::error::{Error, RemoteError};
use crate::executor::test_helpers::{ALBUM_ID, ALBUM_NAME, MockRemote, create_test_executor};

#[tokio::test]
async fn refresh_stores_the_server_album_listing() {
    let (executor, _temp) = create_test_executor(MockRemote::with_numbered_assets(12)).await;

    let catalog = executor.refresh_album_catalog().await.unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].album_id, ALBUM_ID);
    assert_eq!(catalog[0].album_name, ALBUM_NAME);
    assert_eq!(catalog[0].asset_count, 12);

    let stats = executor.db.catalog_stats().await.unwrap();
    assert_eq!((stats.album_count, stats.asset_count), (1, 12));
    assert_eq!(stats.downloaded_album_count, 0);
}

#[tokio::test]
async fn refresh_without_remote_settings_keeps_the_old_catalog() {
    let (executor, _temp) = create_test_executor(MockRemote::with_numbered_assets(3)).await;
    executor.refresh_album_catalog().await.unwrap();

    executor.set_remote_settings(None).await;
    let result = executor.refresh_album_catalog().await;

    assert!(matches!(
        result,
        Err(Error::Remote(RemoteError::NotConfigured))
    ));
    assert_eq!(executor.db.list_album_catalog().await.unwrap().len(), 1);
}
