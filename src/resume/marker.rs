//! Progress marker persistence
//!
//! The marker is a single line holding the last slot that downloaded
//! successfully, e.g. `2020-01-03 14:00:00`. Writes go through a temp file in
//! the same directory and an atomic rename.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::ResumeError;
use crate::{TimeSlot, SLOT_DISPLAY_FORMAT};

/// Default progress file name.
pub const DEFAULT_PROGRESS_FILE: &str = "progress.txt";

/// Marker files larger than this are treated as corrupt.
pub const MAX_MARKER_FILE_SIZE: u64 = 4 * 1024;

/// Single-record store for the last completed slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Create a store backed by `path`. Nothing is touched until save/load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the marker file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the marker with `slot`.
    pub fn save(&self, slot: TimeSlot) -> Result<(), ResumeError> {
        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ResumeError::Io(format!("Failed to create directory: {e}")))?;
                parent
            }
            _ => Path::new("."),
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| ResumeError::Io(format!("Failed to create temp file: {e}")))?;

        writeln!(temp_file, "{}", slot.format(SLOT_DISPLAY_FORMAT))
            .map_err(|e| ResumeError::Io(format!("Failed to write to temp file: {e}")))?;

        temp_file
            .flush()
            .map_err(|e| ResumeError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ResumeError::Io(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(&self.path)
            .map_err(|e| ResumeError::Io(format!("Failed to persist temp file: {e}")))?;

        if let Ok(dir) = std::fs::File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        debug!(path = %self.path.display(), slot = %slot, "Progress saved");
        Ok(())
    }

    /// Read the marker, reporting why it could not be used.
    ///
    /// `Ok(None)` means no marker exists yet.
    pub fn read(&self) -> Result<Option<TimeSlot>, ResumeError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ResumeError::Io(e.to_string())),
        };
        if metadata.len() > MAX_MARKER_FILE_SIZE {
            return Err(ResumeError::Parse(format!(
                "marker is {} bytes, expected a single timestamp",
                metadata.len()
            )));
        }

        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| ResumeError::Io(e.to_string()))?;
        let line = contents.trim();
        NaiveDateTime::parse_from_str(line, SLOT_DISPLAY_FORMAT)
            .map(Some)
            .map_err(|e| ResumeError::Parse(format!("{line:?}: {e}")))
    }

    /// Load the marker, treating any problem as "no marker".
    pub fn load(&self) -> Option<TimeSlot> {
        match self.read() {
            Ok(Some(slot)) => {
                info!(path = %self.path.display(), slot = %slot, "Resuming from saved progress");
                Some(slot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to load progress, starting from configured start date"
                );
                None
            }
        }
    }
}
