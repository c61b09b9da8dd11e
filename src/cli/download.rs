//! Download command: argument parsing and result reporting

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use clap::Parser;
use tracing::{error, info};

use super::CliError;
use crate::downloader::config::{DEFAULT_DOWNLOAD_DIR, DEFAULT_THROTTLE_DELAY_MS};
use crate::downloader::{DownloadConfig, DownloadOrchestrator, RunState, RunSummary};
use crate::fetcher::{DEFAULT_COURTESY_DELAY_MS, DEFAULT_TIMEOUT_SECS};
use crate::proxy::DEFAULT_PROXY_FILE;
use crate::resume::marker::DEFAULT_PROGRESS_FILE;
use crate::schedule::{parse_weekdays, SlotSchedule};
use crate::shutdown::SharedShutdown;
use crate::target::DEFAULT_BASE_URL;
use crate::validator::{DEFAULT_AVG_EXPECTED_KB, DEFAULT_MIN_SIZE_KB};
use crate::SLOT_DISPLAY_FORMAT;

/// Default log file written next to the working directory.
pub const DEFAULT_LOG_FILE: &str = "downloader.log";

/// Parse a calendar date from `YYYY-MM-DD` or an RFC3339 datetime.
///
/// For RFC3339 input only the date part is kept.
fn parse_date_flexible(input: &str) -> Result<NaiveDate, String> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Ok(dt.date_naive());
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|e| format!("invalid date '{input}': {e}"))
}

/// Parse an hour of day (0-23)
fn parse_hour(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value > 23 {
        return Err(format!("hour must be between 0 and 23, got {value}"));
    }
    Ok(value)
}

/// GDELT GKG archive downloader
#[derive(Parser, Debug)]
#[command(name = "gkg-downloader")]
#[command(about = "Download GDELT GKG archives for a date range, resumably", long_about = None)]
#[command(version)]
pub struct Cli {
    /// First day to download (YYYY-MM-DD)
    #[arg(long, default_value = "2020-01-01", value_parser = parse_date_flexible)]
    pub start_date: NaiveDate,

    /// Last day to download, inclusive (YYYY-MM-DD, default: today)
    #[arg(long, value_parser = parse_date_flexible)]
    pub end_date: Option<NaiveDate>,

    /// Directory receiving the archives
    #[arg(long, default_value = DEFAULT_DOWNLOAD_DIR)]
    pub download_dir: PathBuf,

    /// File holding the last completed slot
    #[arg(long, default_value = DEFAULT_PROGRESS_FILE)]
    pub progress_file: PathBuf,

    /// First hour of the day to download (0-23)
    #[arg(long, default_value = "8", value_parser = parse_hour)]
    pub hour_start: u32,

    /// Last hour of the day to download (0-23, inclusive)
    #[arg(long, default_value = "20", value_parser = parse_hour)]
    pub hour_end: u32,

    /// Minutes between slots; must divide a day evenly
    ///
    /// GDELT publishes every 15 minutes, so 15, 30 and 60 are the useful values.
    #[arg(long, default_value = "60")]
    pub interval_minutes: u32,

    /// Weekdays to download, e.g. "mon,tue,wed" or "mon-fri"
    #[arg(long, default_value = "mon,tue,wed,thu,fri")]
    pub weekdays: String,

    /// Route requests through the proxy list
    #[arg(long, default_value_t = false)]
    pub use_proxy: bool,

    /// Proxy list, one host:port per line
    #[arg(long, default_value = DEFAULT_PROXY_FILE)]
    pub proxy_file: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Per-request timeout in proxy mode (default: --timeout-secs)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub proxy_timeout_secs: Option<u64>,

    /// Minimum acceptable archive size in KB
    #[arg(long, default_value_t = DEFAULT_MIN_SIZE_KB)]
    pub min_size_kb: u64,

    /// Typical archive size in KB; files under 5% of it are rejected
    #[arg(long, default_value_t = DEFAULT_AVG_EXPECTED_KB)]
    pub avg_expected_kb: u64,

    /// Archive root URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Pause after each successful download, in milliseconds
    #[arg(long, default_value_t = DEFAULT_COURTESY_DELAY_MS)]
    pub courtesy_delay_ms: u64,

    /// Pause after each slot, in milliseconds
    #[arg(long, default_value_t = DEFAULT_THROTTLE_DELAY_MS)]
    pub throttle_delay_ms: u64,

    /// Output format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Plain-text log file
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Hide per-file progress bars
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// Build and validate the run configuration.
    pub fn to_config(&self) -> Result<DownloadConfig, CliError> {
        let weekdays = parse_weekdays(&self.weekdays)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        let schedule = SlotSchedule::new(
            self.hour_start,
            self.hour_end,
            self.interval_minutes,
            weekdays,
        )
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

        let config = DownloadConfig {
            start_date: self.start_date,
            end_date: self.end_date.unwrap_or_else(|| Local::now().date_naive()),
            schedule,
            base_url: self.base_url.clone(),
            download_dir: self.download_dir.clone(),
            progress_file: self.progress_file.clone(),
            use_proxy: self.use_proxy,
            proxy_file: self.proxy_file.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            proxy_timeout: self.proxy_timeout_secs.map(Duration::from_secs),
            min_size_kb: self.min_size_kb,
            avg_expected_kb: self.avg_expected_kb,
            courtesy_delay: Duration::from_millis(self.courtesy_delay_ms),
            throttle_delay: Duration::from_millis(self.throttle_delay_ms),
            show_progress: !self.no_progress,
        };

        config
            .validate()
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        Ok(config)
    }

    /// Run the download and report the summary.
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<RunSummary, CliError> {
        let config = self.to_config()?;
        info!(
            start_date = %config.start_date,
            end_date = %config.end_date,
            download_dir = %config.download_dir.display(),
            "Starting download"
        );

        let mut orchestrator = DownloadOrchestrator::new(config)?.with_shutdown(shutdown);
        let result = orchestrator.run().await;

        match self.output_format {
            OutputFormat::Json => output_json(&result),
            OutputFormat::Human => output_human(&result),
        }

        result.map_err(CliError::Download)
    }
}

/// Print the run result as a single JSON line
fn output_json(result: &Result<RunSummary, crate::downloader::DownloadError>) {
    let output = match result {
        Ok(summary) => serde_json::json!({
            "success": true,
            "summary": summary,
            "error": null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "summary": null,
            "error": e.to_string(),
        }),
    };
    println!("{output}");
}

/// Print the run result for a terminal
fn output_human(result: &Result<RunSummary, crate::downloader::DownloadError>) {
    match result {
        Ok(summary) => {
            match summary.state {
                RunState::Interrupted => println!("\n[!] Download interrupted by user."),
                _ => println!("\nDownload completed."),
            }
            println!(
                "Started at: {}",
                summary.start_slot.format(SLOT_DISPLAY_FORMAT)
            );
            println!("Slots processed: {}", summary.attempted);
            println!("Files downloaded: {}", summary.downloaded);
            if summary.failed > 0 {
                println!("Files failed: {}", summary.failed);
            }
            if let Some(last) = summary.last_completed {
                println!("Last completed: {}", last.format(SLOT_DISPLAY_FORMAT));
            }
        }
        Err(e) => {
            eprintln!("\nDownload failed!");
            eprintln!("Error: {e}");
            error!("Download failed: {}", e);
        }
    }
}
