//! Download orchestration
//!
//! The downloader drives a run from start to finish:
//!
//! 1. **Configuration**: [`DownloadConfig`] collects the range, schedule and limits
//! 2. **Start resolution**: the saved progress marker wins over the configured start
//! 3. **Slot loop**: [`DownloadOrchestrator`] fetches each slot in order and
//!    checkpoints every success
//! 4. **Shutdown**: a shared coordinator stops the loop between or during slots
//!
//! # Quick Start
//!
//! ```no_run
//! use gkg_downloader::downloader::{DownloadConfig, DownloadOrchestrator, RunState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig {
//!     use_proxy: true,
//!     ..DownloadConfig::default()
//! };
//!
//! let mut orchestrator = DownloadOrchestrator::new(config)?;
//! let summary = orchestrator.run().await?;
//! assert_ne!(summary.state, RunState::Running);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Only setup problems surface as [`DownloadError`]. Failures of individual
//! slots are logged and the loop moves on.

pub mod config;
pub mod orchestrator;
pub mod progress;

pub use config::DownloadConfig;
pub use orchestrator::{DownloadOrchestrator, RunState, RunSummary};

use crate::fetcher::FetcherError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}
