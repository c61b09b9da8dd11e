//! Main entry point for the gkg-downloader CLI

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use gkg_downloader::cli::Cli;
use gkg_downloader::metrics;
use gkg_downloader::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialize tracing: console output plus a plain-text log file.
///
/// `LOG_FORMAT=json` switches the console to JSON. The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_tracing(log_file: &Path) -> anyhow::Result<WorkerGuard> {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gkg_downloader=info"));

    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            parent
        }
        _ => Path::new("."),
    };
    let file_name = log_file
        .file_name()
        .context("Log file path has no file name")?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    let console = if json_format {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };
    let file = fmt::layer().with_ansi(false).with_writer(file_writer).boxed();

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let guard = match init_tracing(&cli.log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let code = run(cli).await;
    // Flush the log file before the process exits
    drop(guard);
    code
}

async fn run(cli: Cli) -> ExitCode {
    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr).await {
            error!("Failed to start metrics exporter: {}", e);
            return ExitCode::FAILURE;
        }
    }

    // Ctrl+C stops the run after the current transfer is discarded
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping download...");
                shutdown.request_shutdown();
            }
        }
    });

    match cli.execute(shutdown).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
