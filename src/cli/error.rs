//! CLI error types and conversions

use crate::downloader::DownloadError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),
}
