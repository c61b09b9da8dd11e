//! Proxy rotation through the fetcher and the reqwest transport

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gkg_downloader::fetcher::transport::{FetchResponse, HttpTransport, ReqwestTransport};
use gkg_downloader::fetcher::{Fetcher, FetcherError, FetcherResult};
use gkg_downloader::proxy::{ProxyEndpoint, ProxyPool};
use gkg_downloader::validator::FileValidator;
use tempfile::TempDir;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Only the listed proxies (or direct, as `None`) answer with an archive.
struct ScriptedTransport {
    working: Vec<Option<String>>,
    log: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    fn new(working: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self {
            working: working.iter().map(|w| w.map(str::to_string)).collect(),
            log: Mutex::new(Vec::new()),
        })
    }

    fn log(&self) -> Vec<Option<String>> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(
        &self,
        _url: &str,
        proxy: Option<&ProxyEndpoint>,
        _timeout: Duration,
    ) -> FetcherResult<FetchResponse> {
        let who = proxy.map(|p| p.address().to_string());
        self.log.lock().unwrap().push(who.clone());
        if self.working.contains(&who) {
            Ok(FetchResponse::from_bytes(200, vec![0u8; 150 * 1024]))
        } else {
            Err(FetcherError::Network(format!("{who:?} unreachable")))
        }
    }
}

fn pool(addresses: &[&str]) -> ProxyPool {
    ProxyPool::parse(&addresses.join("\n"))
}

fn fetcher(transport: Arc<ScriptedTransport>, pool: ProxyPool) -> Fetcher {
    Fetcher::new(transport)
        .with_proxy_pool(pool)
        .with_validator(FileValidator::new(100, 2000))
        .with_courtesy_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_third_proxy_serves_and_stays_current() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(&[Some("p3:3128")]);
    let mut fetcher = fetcher(transport.clone(), pool(&["p1:3128", "p2:3128", "p3:3128"]));

    let first = dir.path().join("first.zip");
    assert!(fetcher.fetch("http://archive.test/first.zip", &first).await);
    assert_eq!(
        transport.log(),
        vec![
            Some("p1:3128".to_string()),
            Some("p2:3128".to_string()),
            Some("p3:3128".to_string()),
        ]
    );
    assert_eq!(fetcher.proxy_pool().unwrap().cursor(), 2);

    let second = dir.path().join("second.zip");
    assert!(fetcher.fetch("http://archive.test/second.zip", &second).await);
    assert_eq!(transport.log().len(), 4);
    assert_eq!(transport.log()[3], Some("p3:3128".to_string()));
}

#[tokio::test]
async fn test_all_proxies_down_falls_back_to_direct() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(&[None]);
    let mut fetcher = fetcher(transport.clone(), pool(&["p1:3128", "p2:3128"]));

    assert!(
        fetcher
            .fetch("http://archive.test/a.zip", &dir.path().join("a.zip"))
            .await
    );
    assert_eq!(
        transport.log(),
        vec![Some("p1:3128".to_string()), Some("p2:3128".to_string()), None]
    );
}

#[tokio::test]
async fn test_everything_down_reports_failure() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(&[]);
    let mut fetcher = fetcher(transport.clone(), pool(&["p1:3128"]));

    let target = dir.path().join("a.zip");
    assert!(!fetcher.fetch("http://archive.test/a.zip", &target).await);
    assert!(!target.exists());
    // A failed request is not retried
    assert_eq!(transport.log().len(), 2);
}

#[tokio::test]
async fn test_reqwest_transport_skips_dead_proxy() {
    // The mock server stands in for a forward proxy and answers any request
    let proxy = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 4096]))
        .mount(&proxy)
        .await;

    let live = proxy.address().to_string();
    let mut pool = ProxyPool::parse(&format!("127.0.0.1:1\n{live}\n"));
    let transport = ReqwestTransport::with_proxies(pool.endpoints()).unwrap();

    let response = pool
        .fetch_via_pool(
            &transport,
            "http://archive.invalid/gdeltv2/20200102080000.gkg.csv.zip",
            Duration::from_secs(5),
        )
        .await
        .expect("live proxy should answer");

    assert_eq!(response.status, 200);
    assert_eq!(response.content_length, Some(4096));
    assert_eq!(pool.cursor(), 1);
    assert_eq!(pool.next().unwrap().address(), live);
}
