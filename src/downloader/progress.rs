//! Terminal progress bars for archive transfers.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

const TRANSFER_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:50.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}";

/// Create a byte-count bar for a transfer of `total` bytes into `save_path`.
pub fn create_transfer_bar(total: u64, save_path: &Path) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(transfer_style());
    pb.set_message(
        save_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    pb
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(TRANSFER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
