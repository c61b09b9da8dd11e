//! Download target derivation
//!
//! Every slot maps to exactly one archive URL and one local file. Nothing here
//! touches the network or the filesystem.

use std::path::{Path, PathBuf};

use crate::{TimeSlot, SLOT_URL_FORMAT};

/// Default GDELT v2 archive root.
pub const DEFAULT_BASE_URL: &str = "http://data.gdeltproject.org/gdeltv2";

/// Suffix of Global Knowledge Graph archives.
const GKG_SUFFIX: &str = ".gkg.csv.zip";

/// URL and local path for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Slot this target was derived from
    pub slot: TimeSlot,
    /// Remote archive URL
    pub url: String,
    /// Local destination path
    pub save_path: PathBuf,
}

impl DownloadTarget {
    /// Build the target for `slot`.
    ///
    /// `base_url` is the archive root without a trailing file name, e.g.
    /// `http://data.gdeltproject.org/gdeltv2`. The local file name is the final
    /// path segment of the resulting URL.
    pub fn for_slot(slot: TimeSlot, base_url: &str, download_dir: &Path) -> Self {
        let url = build_gkg_url(base_url, slot);
        let save_path = download_dir.join(file_name_from_url(&url));
        Self {
            slot,
            url,
            save_path,
        }
    }
}

/// `<base_url>/<YYYYMMDDHHMMSS>.gkg.csv.zip`
pub fn build_gkg_url(base_url: &str, slot: TimeSlot) -> String {
    format!(
        "{}/{}{}",
        base_url.trim_end_matches('/'),
        slot.format(SLOT_URL_FORMAT),
        GKG_SUFFIX
    )
}

/// Final path segment of a URL, ignoring any query string or fragment.
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
