//! Interrupt behavior of a running download

use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use futures_util::{stream, StreamExt};
use gkg_downloader::downloader::{DownloadConfig, DownloadOrchestrator, RunState};
use gkg_downloader::fetcher::{FetchResponse, FetcherResult, HttpTransport};
use gkg_downloader::proxy::ProxyEndpoint;
use gkg_downloader::resume::ProgressStore;
use gkg_downloader::schedule::SlotSchedule;
use gkg_downloader::shutdown::{SharedShutdown, ShutdownCoordinator};
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARCHIVE_PATH: &str = r"^/gdeltv2/\d{14}\.gkg\.csv\.zip$";
const FIRST_ARCHIVE: &str = "20200102080000.gkg.csv.zip";

fn first_slot() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// Thursday 2 January 2020, 08:00 and 09:00.
fn config(base_url: String, dir: &TempDir) -> DownloadConfig {
    let day = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    DownloadConfig {
        start_date: day,
        end_date: day,
        schedule: SlotSchedule::new(8, 9, 60, [Weekday::Thu]).unwrap(),
        base_url,
        download_dir: dir.path().join("gdelt_data"),
        progress_file: dir.path().join("progress.txt"),
        min_size_kb: 100,
        avg_expected_kb: 2000,
        courtesy_delay: Duration::ZERO,
        throttle_delay: Duration::ZERO,
        show_progress: false,
        ..DownloadConfig::default()
    }
}

fn request_shutdown_after(shutdown: &SharedShutdown, delay: Duration) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        shutdown.request_shutdown();
    });
}

async fn serve_archives(kb: usize) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x50u8; kb * 1024]))
        .mount(&server)
        .await;
    server
}

/// Hands over a short body with no length and requests shutdown as the
/// stream ends, so the interrupt lands between the transfer and validation.
struct ShortBodyThenShutdown {
    shutdown: SharedShutdown,
}

#[async_trait]
impl HttpTransport for ShortBodyThenShutdown {
    async fn get(
        &self,
        _url: &str,
        _proxy: Option<&ProxyEndpoint>,
        _timeout: Duration,
    ) -> FetcherResult<FetchResponse> {
        let shutdown = self.shutdown.clone();
        let tail = stream::poll_fn(move |_| -> Poll<Option<FetcherResult<Bytes>>> {
            shutdown.request_shutdown();
            Poll::Ready(None)
        });
        let body = stream::iter(vec![Ok(Bytes::from(vec![1u8; 1024]))]).chain(tail);
        Ok(FetchResponse {
            status: 200,
            content_length: None,
            body: Box::pin(body),
        })
    }
}

#[tokio::test]
async fn test_interrupted_short_transfer_leaves_no_archive() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let transport = Arc::new(ShortBodyThenShutdown {
        shutdown: shutdown.clone(),
    });

    let mut orchestrator = DownloadOrchestrator::with_transport(
        config("http://archive.test/gdeltv2".to_string(), &dir),
        transport,
    )
    .unwrap()
    .with_shutdown(shutdown);

    let summary = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("run should stop promptly after shutdown")
        .unwrap();

    let archive = dir.path().join("gdelt_data").join(FIRST_ARCHIVE);
    assert_eq!(summary.state, RunState::Interrupted);
    assert_eq!(summary.downloaded, 0);
    assert!(!archive.exists());
    assert!(!dir
        .path()
        .join("gdelt_data")
        .join(format!("{FIRST_ARCHIVE}.part"))
        .exists());
    assert!(!dir.path().join("progress.txt").exists());
}

#[tokio::test]
async fn test_interrupt_during_courtesy_delay_keeps_progress() {
    let server = serve_archives(120).await;
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();

    let mut config = config(format!("{}/gdeltv2", server.uri()), &dir);
    config.courtesy_delay = Duration::from_secs(30);
    let mut orchestrator = DownloadOrchestrator::new(config)
        .unwrap()
        .with_shutdown(shutdown.clone());

    request_shutdown_after(&shutdown, Duration::from_millis(300));
    let summary = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("courtesy delay should be cut short")
        .unwrap();

    assert_eq!(summary.state, RunState::Interrupted);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.last_completed, Some(first_slot()));
    assert_eq!(
        ProgressStore::new(dir.path().join("progress.txt")).load(),
        Some(first_slot())
    );
    assert!(dir.path().join("gdelt_data").join(FIRST_ARCHIVE).exists());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_interrupt_during_throttle_delay_keeps_progress() {
    let server = serve_archives(120).await;
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();

    let mut config = config(format!("{}/gdeltv2", server.uri()), &dir);
    config.throttle_delay = Duration::from_secs(30);
    let mut orchestrator = DownloadOrchestrator::new(config)
        .unwrap()
        .with_shutdown(shutdown.clone());

    request_shutdown_after(&shutdown, Duration::from_millis(300));
    let summary = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("throttle delay should be cut short")
        .unwrap();

    assert_eq!(summary.state, RunState::Interrupted);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(
        ProgressStore::new(dir.path().join("progress.txt")).load(),
        Some(first_slot())
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
