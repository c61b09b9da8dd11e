//! # GKG Downloader Library
//!
//! A resumable bulk downloader for the GDELT v2 Global Knowledge Graph archives.
//! GDELT publishes one `*.gkg.csv.zip` file per 15-minute slot; this crate walks a
//! date range slot by slot, restricted to configured weekdays and business hours,
//! and mirrors every file into a local directory.
//!
//! ## Features
//!
//! - **Deterministic Enumeration**: Slots are computed from the calendar, no listing API needed
//! - **Resume Capability**: The last completed slot is checkpointed after every download
//! - **Size Validation**: Truncated files and error pages are detected and re-fetched once
//! - **Proxy Rotation**: Optional round-robin proxy pool with failover to a direct connection
//! - **Graceful Shutdown**: Ctrl+C stops the run without corrupting progress or files
//!
//! ## Quick Start
//!
//! ```no_run
//! use gkg_downloader::downloader::{DownloadConfig, DownloadOrchestrator};
//! use gkg_downloader::shutdown::ShutdownCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig::default();
//! let mut orchestrator = DownloadOrchestrator::new(config)?
//!     .with_shutdown(ShutdownCoordinator::shared());
//!
//! let summary = orchestrator.run().await?;
//! println!("downloaded {} files", summary.downloaded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`schedule`] - Time slot enumeration with weekday and hour filters
//! - [`target`] - URL and local path derivation for a slot
//! - [`proxy`] - Proxy list loading and round-robin rotation
//! - [`fetcher`] - HTTP transport and the fetch-validate-retry cycle
//! - [`validator`] - Size-based acceptance of downloaded files
//! - [`resume`] - Progress marker persistence
//! - [`downloader`] - The orchestration loop tying everything together

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDateTime;

/// CLI argument parsing
pub mod cli;

/// Download orchestration
pub mod downloader;

/// HTTP fetching with validation and retry
pub mod fetcher;

/// Prometheus metrics
pub mod metrics;

/// Proxy pool and rotation
pub mod proxy;

/// Progress persistence for resumable runs
pub mod resume;

/// Time slot enumeration
pub mod schedule;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Download target derivation
pub mod target;

/// Downloaded file validation
pub mod validator;

pub use downloader::{DownloadConfig, DownloadOrchestrator, RunState, RunSummary};
pub use proxy::{ProxyEndpoint, ProxyPool};
pub use schedule::SlotSchedule;
pub use target::DownloadTarget;

/// A discrete wall-clock timestamp at which one download target is defined.
pub type TimeSlot = NaiveDateTime;

/// Format of the persisted progress marker (`2020-01-01 08:00:00`).
pub const SLOT_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact format embedded in archive URLs (`20200101080000`).
pub const SLOT_URL_FORMAT: &str = "%Y%m%d%H%M%S";
