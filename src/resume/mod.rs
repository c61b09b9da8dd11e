//! Resume support for interrupted runs
//!
//! Progress is a single marker naming the last slot that downloaded
//! successfully. Writes are atomic so a crash never leaves a torn marker.

pub mod marker;

pub use marker::ProgressStore;

/// Resume errors
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Marker contents could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}
