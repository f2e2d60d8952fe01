//! Structured logging for wirelens.
//!
//! A [`Logger`] writes run events to stdout and, optionally, appends them to a
//! log file. Lines are either human-readable plain text or newline-delimited
//! JSON (NDJSON) with an `"event"` tag, so a run can be followed live or fed
//! to a log shipper afterwards.
//!
//! Log lines carry local wall-clock timestamps. Report artifacts never do.

use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex};

// ── Event types ──────────────────────────────────────────────────────────────

/// Every kind of event a run can emit.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    /// Progress and status messages.
    Info { message: &'a str },

    /// Recoverable problems such as a missing vendor table.
    Warning { message: &'a str },

    /// A fatal condition; the run stops without writing a report.
    Error { message: &'a str },

    /// A source hardware address was seen for the first time.
    DeviceDiscovered {
        mac:    &'a str,
        vendor: &'a str,
        ip:     &'a str,
    },

    /// First query for a domain.
    Dns { src: &'a str, domain: &'a str },

    /// First ClientHello naming a hostname.
    TlsSni { src: &'a str, sni: &'a str },

    /// First plaintext request for a host.
    HttpRequest {
        src:    &'a str,
        host:   &'a str,
        method: &'a str,
        uri:    &'a str,
    },

    /// A report artifact was written.
    ReportWritten { path: &'a str, rows: usize },

    /// Totals emitted once the report is on disk.
    RunSummary {
        packets_processed: u64,
        parse_errors:      u64,
        devices:           usize,
        dns_queries:       usize,
        tls_hostnames:     usize,
        http_requests:     usize,
        duration_ms:       u128,
        /// Leading queried domains, most frequent first.
        top_dns:           &'a [&'a str],
        /// Leading SNI hostnames, most frequent first.
        top_sni:           &'a [&'a str],
    },
}

// ── Logger ───────────────────────────────────────────────────────────────────

/// Shared, thread-safe structured logger.
///
/// Built once in `main` and handed out as a [`SharedLogger`]. The file writer
/// sits behind a `Mutex` so a line from the Ctrl+C handler thread never
/// interleaves with one from the reading thread.
pub struct Logger {
    json: bool,
    /// `None` when `--log-file` was not given.
    file: Option<Mutex<BufWriter<std::fs::File>>>,
}

pub type SharedLogger = Arc<Logger>;

impl Logger {
    /// Creates a new logger.
    ///
    /// # Arguments
    /// * `json`     - Emit NDJSON instead of plain text when `true`.
    /// * `log_path` - If `Some`, open (or create) this file for appended writes.
    ///
    /// # Errors
    /// Returns an `io::Error` if the log file cannot be opened or created.
    pub fn new(json: bool, log_path: Option<&str>) -> io::Result<Self> {
        let file = match log_path {
            Some(path) => {
                let f = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(BufWriter::new(f)))
            }
            None => None,
        };

        Ok(Self { json, file })
    }

    /// Logs one [`Event`] to stdout and, if configured, to the log file.
    pub fn log(&self, event: &Event) {
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        let line = self.render(event, &timestamp);

        println!("{}", line);

        if let Some(mutex) = &self.file {
            if let Ok(mut writer) = mutex.lock() {
                let _ = writeln!(writer, "{}", line);
                let _ = writer.flush();
            }
        }
    }

    fn render(&self, event: &Event, timestamp: &str) -> String {
        if self.json {
            let mut val = serde_json::to_value(event).unwrap_or_default();
            if let Some(obj) = val.as_object_mut() {
                obj.insert(
                    "timestamp".to_string(),
                    serde_json::Value::String(timestamp.to_string()),
                );
            }
            serde_json::to_string(&val).unwrap_or_default()
        } else {
            format!("[{}] {}", timestamp, plain_text(event))
        }
    }
}

/// Formats an [`Event`] as plain text, without the timestamp.
fn plain_text(event: &Event) -> String {
    match event {
        Event::Info { message } => format!("[INFO] {}", message),

        Event::Warning { message } => format!("[WARN] {}", message),

        Event::Error { message } => format!("[ERROR] {}", message),

        Event::DeviceDiscovered { mac, vendor, ip } =>
            format!("[DEVICE] {} | {} | {}", mac, vendor, ip),

        Event::Dns { src, domain } => format!("[DNS] {} queried {}", src, domain),

        Event::TlsSni { src, sni } => format!("[TLS SNI] {} → {}", src, sni),

        Event::HttpRequest { src, host, method, uri } =>
            format!("[HTTP] {} {} {}{}", src, method, host, uri),

        Event::ReportWritten { path, rows } => format!("[REPORT] {} ({} rows)", path, rows),

        Event::RunSummary {
            packets_processed,
            parse_errors,
            devices,
            dns_queries,
            tls_hostnames,
            http_requests,
            duration_ms,
            top_dns,
            top_sni,
        } => format!(
            "[SUMMARY] packets={} parse_errors={} devices={} dns={} tls={} http={} duration={}ms \
             | Top DNS: {} | Top SNI: {}",
            packets_processed, parse_errors, devices, dns_queries, tls_hostnames, http_requests,
            duration_ms, or_none(top_dns), or_none(top_sni)
        ),
    }
}

fn or_none(keys: &[&str]) -> String {
    if keys.is_empty() { "-".to_string() } else { keys.join(", ") }
}
