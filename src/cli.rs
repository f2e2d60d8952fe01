use crate::pipeline::config::{
    Categories, Resolution, RunConfig, DEFAULT_OUI_PATH, DEFAULT_TOP_N,
};
use clap::Parser;

/// wirelens — offline LAN traffic metadata reporter.
///
/// Reads a saved packet capture and reports which devices were active, what
/// they looked up in DNS, which TLS hostnames they contacted and which
/// plaintext HTTP requests they made, plus protocol and timeline summaries.
#[derive(Parser, Debug, Clone)]
#[command(
    name    = "wirelens",
    version,
    about   = "Offline LAN traffic metadata reporter",
    long_about = None,
)]
pub struct Cli {
    // ── Input / Output ───────────────────────────────────────────────────────

    /// Packet capture to analyse (pcap format, Ethernet or raw IP).
    #[arg(short = 'r', long = "read", value_name = "FILE")]
    pub pcap_file: String,

    /// Directory for the CSV tables and summary.json.
    ///
    /// Created if missing. Existing report files are overwritten.
    #[arg(short = 'o', long = "outdir", value_name = "DIR")]
    pub outdir: String,

    /// Vendor table used to label hardware addresses.
    ///
    /// Accepts the IEEE `oui.txt` listing or a Wireshark `manuf` file. If the
    /// file cannot be read every device is reported with vendor "unknown".
    #[arg(long = "oui", value_name = "FILE", default_value = DEFAULT_OUI_PATH)]
    pub oui: String,

    // ── Stream selection ─────────────────────────────────────────────────────

    /// Stop after this many packets have been kept. 0 reads the whole file.
    #[arg(long = "limit", value_name = "N", default_value_t = 0)]
    pub limit: u64,

    /// Keep every K-th packet (packets 0, K, 2K, ...).
    #[arg(long = "sample", value_name = "K", default_value_t = 1)]
    pub sample: u64,

    // ── Aggregation ──────────────────────────────────────────────────────────

    /// Width of one timeline bucket.
    #[arg(long = "resolution", value_enum, default_value_t = Resolution::Minute)]
    pub resolution: Resolution,

    /// Number of entries in each top-N list.
    #[arg(long = "top", value_name = "N", default_value_t = DEFAULT_TOP_N)]
    pub top: usize,

    /// Skip DNS query extraction.
    #[arg(long = "no-dns")]
    pub no_dns: bool,

    /// Skip TLS SNI extraction.
    #[arg(long = "no-tls")]
    pub no_tls: bool,

    /// Skip HTTP request extraction.
    #[arg(long = "no-http")]
    pub no_http: bool,

    /// Do not track devices by hardware address; the device table stays empty.
    #[arg(long = "ip-only")]
    pub ip_only: bool,

    /// Aggregate on this many threads and merge the results.
    ///
    /// The capture is read in full before aggregation starts. Output is the
    /// same as with a single worker.
    #[arg(long = "workers", value_name = "N", default_value_t = 1)]
    pub workers: usize,

    // ── Logging ──────────────────────────────────────────────────────────────

    /// Emit log entries as newline-delimited JSON (NDJSON).
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Append log output to this file in addition to stdout.
    ///
    /// JSON mode (--json) affects the format written to this file as well.
    #[arg(short = 'l', long = "log-file", value_name = "PATH")]
    pub log_file: Option<String>,

    /// Log the first sighting of every device, domain, SNI hostname and HTTP
    /// host while reading.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Maps the parsed flags onto a run configuration. Validation happens
    /// separately in [`RunConfig::validate`].
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            categories: Categories {
                dns:  !self.no_dns,
                tls:  !self.no_tls,
                http: !self.no_http,
            },
            track_devices: !self.ip_only,
            limit:         (self.limit > 0).then_some(self.limit),
            stride:        self.sample,
            resolution:    self.resolution,
            top_n:         self.top,
            workers:       self.workers,
        }
    }
}
