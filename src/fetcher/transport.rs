//! HTTP transport seam
//!
//! The fetcher only needs "GET this URL, optionally through this proxy, and give
//! me the status plus a byte stream". [`HttpTransport`] captures exactly that,
//! and [`ReqwestTransport`] implements it on a pooled `reqwest::Client`.

use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Proxy};
use tracing::debug;

use super::{FetcherError, FetcherResult};
use crate::proxy::ProxyEndpoint;

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Stream of body chunks from a transport
pub type BodyStream = Pin<Box<dyn Stream<Item = FetcherResult<Bytes>> + Send>>;

/// Normalized response: status, declared length and a streamed body
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Value of the `content-length` header, if present and numeric
    pub content_length: Option<u64>,
    /// Response body
    pub body: BodyStream,
}

impl FetchResponse {
    /// Build a response from an in-memory body.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            content_length: Some(body.len() as u64),
            body: Box::pin(stream::iter(vec![Ok::<_, FetcherError>(body)])),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A single HTTP GET capability
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET for `url`, through `proxy` when given, bounded by `timeout`.
    ///
    /// Any status code is returned as `Ok`; only transport-level failures
    /// (DNS, refused connection, timeout) are errors.
    async fn get(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> FetcherResult<FetchResponse>;
}

/// [`HttpTransport`] backed by `reqwest`
///
/// One client is kept for direct traffic and one per proxy endpoint, so each
/// keeps its own connection pool.
pub struct ReqwestTransport {
    direct: Client,
    proxied: HashMap<String, Client>,
}

impl ReqwestTransport {
    /// Create a transport for direct connections only.
    pub fn new() -> FetcherResult<Self> {
        Self::with_proxies(&[])
    }

    /// Create a transport with clients pre-built for `endpoints`.
    pub fn with_proxies(endpoints: &[ProxyEndpoint]) -> FetcherResult<Self> {
        let direct = build_client(None)?;
        let mut proxied = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            proxied.insert(endpoint.address().to_string(), build_client(Some(endpoint))?);
        }

        Ok(Self { direct, proxied })
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> FetcherResult<Client> {
        match proxy {
            None => Ok(self.direct.clone()),
            Some(endpoint) => match self.proxied.get(endpoint.address()) {
                Some(client) => Ok(client.clone()),
                None => build_client(Some(endpoint)),
            },
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> FetcherResult<FetchResponse> {
        let client = self.client_for(proxy)?;

        debug!(
            url = %url,
            proxy = proxy.map(ProxyEndpoint::address),
            timeout_secs = timeout.as_secs(),
            "Making GET request"
        );

        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let body = response.bytes_stream().map(|chunk| chunk.map_err(map_reqwest_error));

        Ok(FetchResponse {
            status,
            content_length,
            body: Box::pin(body),
        })
    }
}

fn build_client(proxy: Option<&ProxyEndpoint>) -> FetcherResult<Client> {
    let mut builder =
        Client::builder().connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS));

    if let Some(endpoint) = proxy {
        let http = Proxy::http(endpoint.http_url())
            .map_err(|e| FetcherError::Client(format!("invalid proxy {endpoint}: {e}")))?;
        let https = Proxy::https(endpoint.https_url())
            .map_err(|e| FetcherError::Client(format!("invalid proxy {endpoint}: {e}")))?;
        builder = builder.proxy(http).proxy(https);
    }

    builder
        .build()
        .map_err(|e| FetcherError::Client(format!("failed to build HTTP client: {e}")))
}

fn map_reqwest_error(e: reqwest::Error) -> FetcherError {
    if e.is_timeout() {
        FetcherError::Timeout(e.to_string())
    } else {
        FetcherError::Network(e.to_string())
    }
}
