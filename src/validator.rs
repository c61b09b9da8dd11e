//! Size-based validation of downloaded archives
//!
//! A truncated transfer or an HTML error page served with status 200 is much
//! smaller than a real GKG archive. Files below the threshold are deleted so
//! that the next attempt starts clean.

use std::path::Path;

use tracing::{info, warn};

/// Default minimum acceptable size in KB.
pub const DEFAULT_MIN_SIZE_KB: u64 = 100;

/// Default average size of a GKG archive in KB.
pub const DEFAULT_AVG_EXPECTED_KB: u64 = 2048;

/// Fraction of the expected average a file must reach.
pub const EXPECTED_FRACTION: f64 = 0.05;

/// Decides whether a file on disk is a plausible archive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileValidator {
    min_size_kb: u64,
    avg_expected_kb: u64,
}

impl FileValidator {
    /// Create a validator with custom thresholds.
    pub fn new(min_size_kb: u64, avg_expected_kb: u64) -> Self {
        Self {
            min_size_kb,
            avg_expected_kb,
        }
    }

    /// Effective threshold: the larger of the absolute and fractional limits.
    pub fn threshold_kb(&self) -> f64 {
        (self.min_size_kb as f64).max(EXPECTED_FRACTION * self.avg_expected_kb as f64)
    }

    /// Whether a size in KB passes both limits.
    pub fn accepts_size_kb(&self, size_kb: f64) -> bool {
        !(size_kb < self.min_size_kb as f64
            || size_kb < EXPECTED_FRACTION * self.avg_expected_kb as f64)
    }

    /// Whether the file at `path` is large enough. Missing files are not.
    pub async fn is_acceptable(&self, path: &Path) -> bool {
        match file_size_kb(path).await {
            Some(size_kb) => self.accepts_size_kb(size_kb),
            None => false,
        }
    }

    /// Check a file found on disk before downloading.
    ///
    /// Returns `true` if the file can be kept; otherwise the file is deleted and
    /// the caller must download it again.
    pub async fn check_existing(&self, path: &Path) -> bool {
        let size_kb = file_size_kb(path).await.unwrap_or(0.0);
        if self.accepts_size_kb(size_kb) {
            info!(
                path = %path.display(),
                size_kb = format_args!("{size_kb:.2}"),
                "File already downloaded"
            );
            return true;
        }

        warn!(
            path = %path.display(),
            size_kb = format_args!("{size_kb:.2}"),
            "File too small or corrupted, deleting and retrying"
        );
        remove_quietly(path).await;
        false
    }

    /// Check a freshly downloaded file, deleting it if it is too small.
    pub async fn check_downloaded(&self, path: &Path) -> bool {
        let size_kb = file_size_kb(path).await.unwrap_or(0.0);
        if self.accepts_size_kb(size_kb) {
            return true;
        }

        warn!(
            path = %path.display(),
            size_kb = format_args!("{size_kb:.2}"),
            threshold_kb = self.threshold_kb(),
            "Downloaded file is too small"
        );
        crate::metrics::record_file_rejected();
        remove_quietly(path).await;
        false
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIZE_KB, DEFAULT_AVG_EXPECTED_KB)
    }
}

/// Size of the file at `path` in KB, or `None` if it cannot be read.
pub async fn file_size_kb(path: &Path) -> Option<f64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len() as f64 / 1024.0)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete rejected file");
        }
    }
}
