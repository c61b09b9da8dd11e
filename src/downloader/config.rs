//! Download configuration and defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use super::DownloadError;
use crate::fetcher::{DEFAULT_COURTESY_DELAY_MS, DEFAULT_TIMEOUT_SECS};
use crate::proxy::DEFAULT_PROXY_FILE;
use crate::resume::marker::DEFAULT_PROGRESS_FILE;
use crate::schedule::SlotSchedule;
use crate::target::DEFAULT_BASE_URL;
use crate::validator::{FileValidator, DEFAULT_AVG_EXPECTED_KB, DEFAULT_MIN_SIZE_KB};

/// Default download directory.
pub const DEFAULT_DOWNLOAD_DIR: &str = "gdelt_data";

/// Default pause between slots, in milliseconds.
pub const DEFAULT_THROTTLE_DELAY_MS: u64 = 1000;

/// First day of the default range: 2020-01-01.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Everything a run needs
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// First calendar day to download
    pub start_date: NaiveDate,
    /// Last calendar day to download (inclusive)
    pub end_date: NaiveDate,
    /// Weekday, hour and interval filters
    pub schedule: SlotSchedule,
    /// Archive root URL
    pub base_url: String,
    /// Directory receiving archives
    pub download_dir: PathBuf,
    /// Progress marker location
    pub progress_file: PathBuf,
    /// Route requests through the proxy list
    pub use_proxy: bool,
    /// Proxy list location
    pub proxy_file: PathBuf,
    /// Per-request timeout
    pub timeout: Duration,
    /// Per-request timeout in proxy mode; `None` uses `timeout`
    pub proxy_timeout: Option<Duration>,
    /// Absolute minimum archive size in KB
    pub min_size_kb: u64,
    /// Typical archive size in KB
    pub avg_expected_kb: u64,
    /// Pause after each successful download
    pub courtesy_delay: Duration,
    /// Pause after each processed slot
    pub throttle_delay: Duration,
    /// Show per-file progress bars
    pub show_progress: bool,
}

impl DownloadConfig {
    /// Check cross-field constraints the types cannot express.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.start_date > self.end_date {
            return Err(DownloadError::Configuration(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.timeout.is_zero() || self.proxy_timeout.is_some_and(|t| t.is_zero()) {
            return Err(DownloadError::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(DownloadError::Configuration("base URL is empty".to_string()));
        }
        Ok(())
    }

    /// Validator built from the size thresholds.
    pub fn validator(&self) -> FileValidator {
        FileValidator::new(self.min_size_kb, self.avg_expected_kb)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: Local::now().date_naive(),
            schedule: SlotSchedule::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            progress_file: PathBuf::from(DEFAULT_PROGRESS_FILE),
            use_proxy: false,
            proxy_file: PathBuf::from(DEFAULT_PROXY_FILE),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy_timeout: None,
            min_size_kb: DEFAULT_MIN_SIZE_KB,
            avg_expected_kb: DEFAULT_AVG_EXPECTED_KB,
            courtesy_delay: Duration::from_millis(DEFAULT_COURTESY_DELAY_MS),
            throttle_delay: Duration::from_millis(DEFAULT_THROTTLE_DELAY_MS),
            show_progress: true,
        }
    }
}
