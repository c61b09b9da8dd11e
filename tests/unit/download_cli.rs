//! Unit tests for the download command line

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gkg_downloader::cli::{Cli, CliError, OutputFormat};

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["gkg-downloader"]);

    assert_eq!(cli.download_dir, PathBuf::from("gdelt_data"));
    assert_eq!(cli.progress_file, PathBuf::from("progress.txt"));
    assert_eq!(cli.proxy_file, PathBuf::from("proxies.txt"));
    assert_eq!(cli.log_file, PathBuf::from("downloader.log"));
    assert_eq!(cli.base_url, "http://data.gdeltproject.org/gdeltv2");
    assert_eq!(cli.min_size_kb, 100);
    assert_eq!(cli.avg_expected_kb, 2048);
    assert_eq!(cli.courtesy_delay_ms, 2000);
    assert_eq!(cli.throttle_delay_ms, 1000);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(cli.end_date.is_none());
    assert!(cli.metrics_addr.is_none());
    assert!(!cli.use_proxy);
}

#[test]
fn test_cli_delays_and_thresholds_flow_into_config() {
    let cli = Cli::parse_from([
        "gkg-downloader",
        "--end-date",
        "2020-01-10",
        "--courtesy-delay-ms",
        "0",
        "--throttle-delay-ms",
        "250",
        "--min-size-kb",
        "50",
        "--avg-expected-kb",
        "4000",
        "--metrics-addr",
        "127.0.0.1:9090",
    ]);
    let config = cli.to_config().unwrap();

    assert_eq!(config.courtesy_delay, Duration::ZERO);
    assert_eq!(config.throttle_delay, Duration::from_millis(250));
    assert!((config.validator().threshold_kb() - 200.0).abs() < 1e-9);
    assert_eq!(cli.metrics_addr.unwrap().port(), 9090);
}

#[test]
fn test_cli_rejects_unknown_weekday() {
    let cli = Cli::parse_from(["gkg-downloader", "--end-date", "2020-01-10", "--weekdays", "funday"]);
    assert!(matches!(cli.to_config(), Err(CliError::InvalidArgument(_))));
}

#[test]
fn test_cli_rejects_malformed_values() {
    assert!(Cli::try_parse_from(["gkg-downloader", "--start-date", "yesterday"]).is_err());
    assert!(Cli::try_parse_from(["gkg-downloader", "--output-format", "xml"]).is_err());
    assert!(Cli::try_parse_from(["gkg-downloader", "--metrics-addr", "nowhere"]).is_err());
}
