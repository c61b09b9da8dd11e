//! reqwest transport against a mock HTTP server

use std::time::Duration;

use futures_util::StreamExt;
use gkg_downloader::fetcher::transport::{HttpTransport, ReqwestTransport};
use gkg_downloader::fetcher::FetcherError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_streams_body_and_reports_length() {
    let server = MockServer::start().await;
    let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/gdeltv2/20200102080000.gkg.csv.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let url = format!("{}/gdeltv2/20200102080000.gkg.csv.zip", server.uri());
    let mut response = transport
        .get(&url, None, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.is_success());
    assert_eq!(response.content_length, Some(body.len() as u64));

    let mut received = Vec::new();
    while let Some(chunk) = response.body.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, body);
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
        .get(&format!("{}/missing.zip", server.uri()), None, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let result = transport
        .get(&format!("{}/slow.zip", server.uri()), None, Duration::from_millis(200))
        .await;

    assert!(matches!(result, Err(FetcherError::Timeout(_))));
}

#[tokio::test]
async fn test_refused_connection_is_network_error() {
    let transport = ReqwestTransport::new().unwrap();
    let result = transport
        .get("http://127.0.0.1:1/x.zip", None, Duration::from_secs(2))
        .await;

    assert!(matches!(result, Err(FetcherError::Network(_))));
}
