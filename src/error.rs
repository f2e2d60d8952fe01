//! Error types for wirelens.
//!
//! Only fatal conditions live here. Per-frame decode failures are counted as
//! parse errors by the pipeline and never abort a run.

use thiserror::Error;

/// Result type alias for fallible wirelens operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Conditions that abort a run before (or instead of) writing a report.
#[derive(Error, Debug)]
pub enum Error {
    /// Settings rejected by `RunConfig::validate`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The capture file could not be opened.
    #[error("cannot open capture '{path}': {source}")]
    Capture {
        path:   String,
        #[source]
        source: pcap::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single captured frame could not be turned into a packet summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unsupported link type {0}")]
    UnsupportedLinkType(i32),
}
