//! Persists a [`Report`] as CSV tables plus `summary.json`.

use crate::error::Result;
use crate::report::Report;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One file produced by [`ReportWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub path: PathBuf,
    /// Data rows, not counting the header. Zero for the summary document.
    pub rows: usize,
}

/// Writes report artifacts into a single output directory.
pub struct ReportWriter {
    outdir: PathBuf,
}

impl ReportWriter {
    /// Creates the output directory if it does not exist.
    pub fn create(outdir: impl Into<PathBuf>) -> Result<Self> {
        let outdir = outdir.into();
        fs::create_dir_all(&outdir)?;
        Ok(Self { outdir })
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Writes every table and the summary, overwriting earlier runs.
    pub fn write(&self, report: &Report) -> Result<Vec<Written>> {
        let t = &report.tables;
        let timeline_name = format!("timeline_{}.csv", report.summary.resolution);

        let written = vec![
            self.table(
                "devices.csv",
                &["mac", "vendor", "randomized", "ips_seen", "first_seen_epoch", "last_seen_epoch", "packet_count"],
                &t.devices,
            )?,
            self.table("dns_queries.csv", &["time_epoch", "client_ip", "query", "qtype"], &t.dns)?,
            self.table("tls_sni.csv", &["time_epoch", "src_ip", "dst_ip", "sni_hostname"], &t.tls)?,
            self.table(
                "http_requests.csv",
                &["time_epoch", "src_ip", "host", "method", "uri", "user_agent", "has_auth_header"],
                &t.http,
            )?,
            self.table("protocols.csv", &["protocol", "packet_count"], &t.protocols)?,
            self.table(&timeline_name, &["bucket_start_epoch", "packet_count"], &t.timeline)?,
            self.summary(report)?,
        ];
        Ok(written)
    }

    /// Writes a header row even when `rows` is empty, so every table exists
    /// with a stable schema.
    fn table<T: Serialize>(&self, name: &str, headers: &[&str], rows: &[T]) -> Result<Written> {
        let path = self.outdir.join(name);
        let mut w = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        w.write_record(headers)?;
        for row in rows {
            w.serialize(row)?;
        }
        w.flush()?;
        Ok(Written { path, rows: rows.len() })
    }

    fn summary(&self, report: &Report) -> Result<Written> {
        let path = self.outdir.join("summary.json");
        let mut out = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut out, &report.summary)?;
        writeln!(out)?;
        out.flush()?;
        Ok(Written { path, rows: 0 })
    }
}
