use crate::error::Error;
use serde::Serialize;
use std::fmt;

/// Number of entries kept in each top-N list when `--top` is not given.
///
/// Fifteen is enough to show the handful of dominant destinations plus the
/// long tail an observer would use to fingerprint installed software.
pub const DEFAULT_TOP_N: usize = 15;

/// Vendor placeholder for hardware addresses whose prefix is not in the table.
pub const UNKNOWN_VENDOR: &str = "unknown";

/// Number of leading octets of a hardware address that identify the vendor.
pub const OUI_LEN: usize = 3;

/// Default vendor table location, relative to the working directory.
pub const DEFAULT_OUI_PATH: &str = "oui.txt";

/// Width of one timeline bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Second,
    Minute,
    Hour,
}

impl Resolution {
    pub fn width_secs(self) -> i64 {
        match self {
            Resolution::Second => 1,
            Resolution::Minute => 60,
            Resolution::Hour => 3_600,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Minute
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which category extractors run. A disabled extractor is never invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Categories {
    pub dns:  bool,
    pub tls:  bool,
    pub http: bool,
}

impl Default for Categories {
    fn default() -> Self {
        Self { dns: true, tls: true, http: true }
    }
}

/// Everything the aggregation pipeline needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub categories:    Categories,
    /// When `false` the device inventory stays empty for the whole run.
    pub track_devices: bool,
    /// Stop after this many packets. `None` means unlimited.
    pub limit:         Option<u64>,
    /// Process packets at positions 0, stride, 2*stride, ...
    pub stride:        u64,
    pub resolution:    Resolution,
    pub top_n:         usize,
    /// Number of shards aggregated in parallel. 1 keeps the single ordered pass.
    pub workers:       usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            categories:    Categories::default(),
            track_devices: true,
            limit:         None,
            stride:        1,
            resolution:    Resolution::default(),
            top_n:         DEFAULT_TOP_N,
            workers:       1,
        }
    }
}

impl RunConfig {
    /// Rejects settings that would make the run meaningless.
    ///
    /// Called before any packet is read, so an invalid configuration never
    /// produces a partial report.
    pub fn validate(&self) -> Result<(), Error> {
        if self.top_n < 1 {
            return Err(Error::InvalidConfig("top-N size must be at least 1".into()));
        }
        if self.stride < 1 {
            return Err(Error::InvalidConfig("sample stride must be at least 1".into()));
        }
        if self.workers < 1 {
            return Err(Error::InvalidConfig("worker count must be at least 1".into()));
        }
        Ok(())
    }
}
