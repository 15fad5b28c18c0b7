#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::error::RemoteError;
use crate::types::MediaType;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ImmichClient {
    ImmichClient::new(&RemoteConfig::new(server.uri(), "secret-key")).unwrap()
}

// -----------------------------------------------------------------------
// URL normalization
// -----------------------------------------------------------------------

#[test]
fn base_url_gets_api_suffix() {
    assert_eq!(
        normalize_base_url("https://photos.example.com").unwrap(),
        "https://photos.example.com/api"
    );
    assert_eq!(
        normalize_base_url("https://photos.example.com/").unwrap(),
        "https://photos.example.com/api"
    );
}

#[test]
fn existing_api_suffix_is_kept_once() {
    assert_eq!(
        normalize_base_url("https://photos.example.com/api/").unwrap(),
        "https://photos.example.com/api"
    );
}

#[test]
fn unparseable_url_is_a_config_error() {
    assert!(matches!(
        normalize_base_url("not a url"),
        Err(Error::Config { .. })
    ));
    assert!(matches!(normalize_base_url("  "), Err(Error::Config { .. })));
}

// -----------------------------------------------------------------------
// Probe
// -----------------------------------------------------------------------

#[tokio::test]
async fn probe_sends_api_key_and_accepts_pong() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server-info/ping"))
        .and(header("x-api-key", "secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"res": "pong"})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).probe().await.unwrap();
}

#[tokio::test]
async fn probe_maps_401_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server-info/ping"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).probe().await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::Unauthorized)));
}

#[tokio::test]
async fn probe_rejects_unexpected_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server-info/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"res": "nope"})))
        .mount(&server)
        .await;

    let err = client_for(&server).probe().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Remote(RemoteError::UnexpectedResponse(_))
    ));
}

#[tokio::test]
async fn probe_rejects_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server-info/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).probe().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Remote(RemoteError::UnexpectedResponse(_))
    ));
}

#[tokio::test]
async fn server_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server-info/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    match client_for(&server).probe().await.unwrap_err() {
        Error::Remote(RemoteError::HttpStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_reported_as_such() {
    // Nothing listens on port 9 (discard) in the test environment
    let client = ImmichClient::new(&RemoteConfig {
        url: "http://127.0.0.1:9".to_string(),
        api_key: "k".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client.probe().await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::Unreachable(_))));
}

// -----------------------------------------------------------------------
// Albums and assets
// -----------------------------------------------------------------------

#[tokio::test]
async fn list_albums_parses_summaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a1", "albumName": "Holiday", "assetCount": 12},
            {"id": "a2", "albumName": "Family", "assetCount": 3}
        ])))
        .mount(&server)
        .await;

    let albums = client_for(&server).list_albums().await.unwrap();

    assert_eq!(albums.len(), 2);
    assert_eq!(albums[0].name, "Holiday");
    assert_eq!(albums[1].asset_count, 3);
}

#[tokio::test]
async fn album_info_includes_assets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/albums/album-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "album-7",
            "albumName": "Trip",
            "assets": [
                {"id": "x1", "originalFileName": "IMG_1.JPG", "type": "IMAGE"},
                {"id": "x2", "originalFileName": "clip.mov", "type": "VIDEO"}
            ]
        })))
        .mount(&server)
        .await;

    let album = client_for(&server).album_info("album-7").await.unwrap();

    assert_eq!(album.assets.len(), 2);
    assert_eq!(album.assets[0].original_filename, "IMG_1.JPG");
    assert_eq!(album.assets[1].media_type, MediaType::Video);
}

#[tokio::test]
async fn missing_album_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/albums/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).album_info("gone").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "remote server error: fetching album: HTTP error 404"
    );
}

#[tokio::test]
async fn fetch_asset_bytes_returns_original_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/assets/x1/original"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
        .mount(&server)
        .await;

    let bytes = client_for(&server).fetch_asset_bytes("x1").await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn factory_builds_working_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server-info/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"res": "pong"})))
        .mount(&server)
        .await;

    let source = ImmichClientFactory
        .create(&RemoteConfig::new(format!("{}/api", server.uri()), "k"))
        .unwrap();

    source.probe().await.unwrap();
}
