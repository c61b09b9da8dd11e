//! Archive fetcher with a single retry on undersized downloads
//!
//! [`Fetcher::fetch`] turns one URL into one validated file on disk. Transport
//! failures and non-200 responses are final for the slot; a file that arrives
//! but fails size validation earns exactly one more attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::downloader::progress::create_transfer_bar;
use crate::proxy::ProxyPool;
use crate::shutdown::SharedShutdown;
use crate::validator::{file_size_kb, FileValidator};

pub mod transport;

pub use transport::{FetchResponse, HttpTransport, ReqwestTransport};

/// Attempts per URL: the first download plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Write buffer size for streamed bodies.
pub const CHUNK_SIZE: usize = 8192;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default pause after a successful download, in milliseconds.
pub const DEFAULT_COURTESY_DELAY_MS: u64 = 2000;

/// Suffix of in-progress downloads.
const PARTIAL_SUFFIX: &str = "part";

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection-level failure (DNS, refused, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Server answered with a status other than 200
    #[error("unexpected HTTP status: {0}")]
    HttpStatus(u16),

    /// Local filesystem error while writing the body
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Downloads one URL to one path, validating the result
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    pool: Option<ProxyPool>,
    validator: FileValidator,
    timeout: Duration,
    proxy_timeout: Option<Duration>,
    courtesy_delay: Duration,
    show_progress: bool,
    shutdown: Option<SharedShutdown>,
}

impl Fetcher {
    /// Create a fetcher using direct connections and default limits.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            pool: None,
            validator: FileValidator::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy_timeout: None,
            courtesy_delay: Duration::from_millis(DEFAULT_COURTESY_DELAY_MS),
            show_progress: false,
            shutdown: None,
        }
    }

    /// Route requests through `pool`, falling back to direct connections.
    pub fn with_proxy_pool(mut self, pool: ProxyPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use a custom validator.
    pub fn with_validator(mut self, validator: FileValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Per-request timeout for direct mode.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-request timeout in proxy mode. Defaults to the direct timeout.
    pub fn with_proxy_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.proxy_timeout = timeout;
        self
    }

    /// Pause after each successful download.
    pub fn with_courtesy_delay(mut self, delay: Duration) -> Self {
        self.courtesy_delay = delay;
        self
    }

    /// Show a byte progress bar when the size is known.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Cut the courtesy delay short on shutdown.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The proxy pool, when proxy mode is on.
    pub fn proxy_pool(&self) -> Option<&ProxyPool> {
        self.pool.as_ref()
    }

    /// The validator in use.
    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    /// Download `url` to `save_path`.
    ///
    /// Returns `true` when a valid file is on disk afterwards, either because it
    /// was already there or because it was just downloaded. Never returns an
    /// error: every failure is logged and reported as `false`.
    pub async fn fetch(&mut self, url: &str, save_path: &Path) -> bool {
        for attempt in 1..=MAX_ATTEMPTS {
            if path_exists(save_path).await && self.validator.check_existing(save_path).await {
                return true;
            }

            info!(url = %url, attempt, "Downloading");
            if let Err(e) = self.download(url, save_path).await {
                error!(url = %url, error = %e, "Error downloading");
                self.discard_partial(save_path).await;
                return false;
            }

            // Only a validated body is renamed to the final name
            let part = partial_path(save_path);
            if self.validator.check_downloaded(&part).await {
                if let Err(e) = tokio::fs::rename(&part, save_path).await {
                    error!(path = %save_path.display(), error = %e, "Error saving download");
                    self.discard_partial(save_path).await;
                    return false;
                }
                let size_kb = file_size_kb(save_path).await.unwrap_or(0.0);
                info!(
                    path = %save_path.display(),
                    size_kb = format_args!("{size_kb:.2}"),
                    "Saved"
                );
                self.courtesy_pause().await;
                return true;
            }

            if attempt < MAX_ATTEMPTS {
                info!(url = %url, "Retrying download due to small file size");
            }
        }

        false
    }

    /// Remove the in-progress file for `save_path`, if any.
    pub async fn discard_partial(&self, save_path: &Path) {
        let part = partial_path(save_path);
        match tokio::fs::remove_file(&part).await {
            Ok(()) => info!(path = %part.display(), "Discarded partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %part.display(), error = %e, "Failed to remove partial download"),
        }
    }

    /// Stream the body of `url` into `<save_path>.part`.
    async fn download(&mut self, url: &str, save_path: &Path) -> FetcherResult<()> {
        let response = self.request(url).await?;
        if response.status != 200 {
            return Err(FetcherError::HttpStatus(response.status));
        }

        self.write_body(response, &partial_path(save_path), save_path)
            .await
    }

    async fn request(&mut self, url: &str) -> FetcherResult<FetchResponse> {
        match self.pool.as_mut() {
            Some(pool) => {
                let timeout = self.proxy_timeout.unwrap_or(self.timeout);
                pool.fetch_via_pool(self.transport.as_ref(), url, timeout)
                    .await
                    .ok_or_else(|| {
                        FetcherError::Network("no proxy or direct connection succeeded".to_string())
                    })
            }
            None => self.transport.get(url, None, self.timeout).await,
        }
    }

    async fn write_body(
        &self,
        response: FetchResponse,
        part: &Path,
        save_path: &Path,
    ) -> FetcherResult<()> {
        let file = tokio::fs::File::create(part).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(CHUNK_SIZE, file);

        let bar = match response.content_length {
            Some(total) if self.show_progress => Some(create_transfer_bar(total, save_path)),
            _ => None,
        };

        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            writer.write_all(&chunk).await?;
            if let Some(bar) = &bar {
                bar.inc(chunk.len() as u64);
            }
        }

        writer.flush().await?;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(())
    }

    async fn courtesy_pause(&self) {
        match &self.shutdown {
            Some(shutdown) => {
                shutdown.sleep_or_shutdown(self.courtesy_delay).await;
            }
            None if !self.courtesy_delay.is_zero() => tokio::time::sleep(self.courtesy_delay).await,
            None => {}
        }
    }
}

/// `<save_path>.part`
pub fn partial_path(save_path: &Path) -> PathBuf {
    let mut name = save_path.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
