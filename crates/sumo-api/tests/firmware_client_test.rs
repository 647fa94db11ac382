#![allow(clippy::unwrap_used)]
// Integration tests for `FirmwareClient` using wiremock.

use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sumo_api::{Error, FirmwareClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FirmwareClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = FirmwareClient::with_client(
        reqwest::Client::new(),
        base.join("/download").unwrap(),
        base.join("/sumorobot-firmware/master/").unwrap(),
    );
    (server, client)
}

// ── Index resolution ────────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_relative_link() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ul>\n<a href=\"/resources/firmware/esp32-20190125-v1.10.bin\">esp32</a>\n</ul>\n",
        ))
        .mount(&server)
        .await;

    let url = client.resolve_binary_url("firmware/esp32").await.unwrap();
    assert_eq!(url.path(), "/resources/firmware/esp32-20190125-v1.10.bin");
    assert_eq!(url.host_str(), Url::parse(&server.uri()).unwrap().host_str());
}

#[tokio::test]
async fn test_resolve_absolute_link() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<a href=\"https://cdn.example.com/firmware/esp32-latest.bin\">esp32</a>",
        ))
        .mount(&server)
        .await;

    let url = client.resolve_binary_url("firmware/esp32").await.unwrap();
    assert_eq!(url.as_str(), "https://cdn.example.com/firmware/esp32-latest.bin");
}

#[tokio::test]
async fn test_resolve_without_marker() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nothing here</html>"))
        .mount(&server)
        .await;

    let result = client.resolve_binary_url("firmware/esp32").await;
    assert!(
        matches!(result, Err(Error::MarkerNotFound { .. })),
        "expected MarkerNotFound, got: {result:?}"
    );
    assert!(result.unwrap_err().is_resolution());
}

#[tokio::test]
async fn test_index_http_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client.resolve_binary_url("firmware/esp32").await;
    assert!(
        matches!(result, Err(Error::Status { status: 503, .. })),
        "expected HTTP 503, got: {result:?}"
    );
}

// ── Downloads ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_download_source_file() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sumorobot-firmware/master/hal.py"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"class Sumorobot: pass\n".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let body = client.download_source_file("hal.py").await.unwrap();
    assert_eq!(&body[..], b"class Sumorobot: pass\n");
}

#[tokio::test]
async fn test_download_missing_file() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sumorobot-firmware/master/boot.py"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.download_source_file("boot.py").await.unwrap_err();
    assert!(err.is_not_found(), "expected 404, got: {err:?}");
}
