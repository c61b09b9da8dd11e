//! Proxy list loading and round-robin rotation
//!
//! The pool owns its endpoints and the rotation cursor. The cursor only moves
//! when a proxy fails, so a working proxy keeps being used until it stops
//! working.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::fetcher::transport::{FetchResponse, HttpTransport};
use crate::metrics;

/// Default proxy list file.
pub const DEFAULT_PROXY_FILE: &str = "proxies.txt";

/// A proxy address with the URLs used for plain and TLS traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    address: String,
    http: String,
    https: String,
}

impl ProxyEndpoint {
    /// Create an endpoint from a `host:port` line.
    ///
    /// Both schemes are tunnelled through the proxy over plain HTTP. A line
    /// that already carries a scheme (`socks5://...`) is used verbatim.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let url = if address.contains("://") {
            address.clone()
        } else {
            format!("http://{address}")
        };

        Self {
            http: url.clone(),
            https: url,
            address,
        }
    }

    /// The address as written in the proxy list
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Proxy URL for `http://` requests
    pub fn http_url(&self) -> &str {
        &self.http
    }

    /// Proxy URL for `https://` requests
    pub fn https_url(&self) -> &str {
        &self.https
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Ordered proxy endpoints with a rotation cursor
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    cursor: usize,
}

impl ProxyPool {
    /// Create a pool from endpoints, cursor at the first one.
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            endpoints,
            cursor: 0,
        }
    }

    /// Parse a proxy list: one `host:port` per line, `#` comments and blank
    /// lines ignored.
    pub fn parse(contents: &str) -> Self {
        let endpoints = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(ProxyEndpoint::new)
            .collect();
        Self::new(endpoints)
    }

    /// Load a proxy list file. A missing or unreadable file yields an empty pool.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let pool = Self::parse(&contents);
                info!(
                    path = %path.display(),
                    proxies = pool.len(),
                    "Loaded proxy list"
                );
                pool
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Proxy file not found, no proxies loaded");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read proxy file, no proxies loaded");
                Self::default()
            }
        }
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the pool has no endpoints
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in rotation order
    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    /// Index of the endpoint [`next`](Self::next) returns
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The current endpoint. Does not move the cursor.
    pub fn next(&self) -> Option<&ProxyEndpoint> {
        self.endpoints.get(self.cursor)
    }

    /// Move the cursor to the following endpoint, wrapping at the end.
    pub fn advance(&mut self) {
        if !self.endpoints.is_empty() {
            self.cursor = (self.cursor + 1) % self.endpoints.len();
        }
    }

    /// GET `url` through the pool, falling back to a direct connection.
    ///
    /// Each endpoint is tried at most once, starting at the cursor. A transport
    /// error or non-2xx status advances the cursor; the first success is
    /// returned and leaves the cursor on the endpoint that worked. When every
    /// proxy fails (or the pool is empty) one direct attempt is made. Returns
    /// `None` only if that also fails.
    pub async fn fetch_via_pool(
        &mut self,
        transport: &dyn HttpTransport,
        url: &str,
        timeout: Duration,
    ) -> Option<FetchResponse> {
        for _ in 0..self.endpoints.len() {
            let Some(proxy) = self.next().cloned() else {
                break;
            };

            info!(proxy = %proxy, "Trying proxy");
            match transport.get(url, Some(&proxy), timeout).await {
                Ok(response) if response.is_success() => {
                    info!(proxy = %proxy, "Proxy success");
                    return Some(response);
                }
                Ok(response) => {
                    warn!(proxy = %proxy, status = response.status, "Proxy failed");
                }
                Err(e) => {
                    warn!(proxy = %proxy, error = %e, "Proxy failed");
                }
            }

            metrics::record_proxy_failure();
            self.advance();
        }

        if !self.endpoints.is_empty() {
            warn!("All proxies failed, trying without proxy");
            metrics::record_direct_fallback();
        }

        info!("Trying direct connection (no proxy)");
        match transport.get(url, None, timeout).await {
            Ok(response) if response.is_success() => {
                info!("Direct connection successful");
                Some(response)
            }
            Ok(response) => {
                warn!(status = response.status, "Direct connection failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "Direct connection failed");
                None
            }
        }
    }
}
