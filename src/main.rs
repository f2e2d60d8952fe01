mod capture;
mod cli;
mod error;
mod logger;
mod pipeline;
mod report;

use capture::{LinkKind, PcapSource};
use chrono::{TimeZone, Utc};
use clap::Parser;
use cli::Cli;
use error::Result;
use logger::{Event, Logger, SharedLogger};
use pipeline::sampling::{select_for, until_shutdown};
use pipeline::shard::run_sharded;
use pipeline::types::Timestamp;
use pipeline::vendor::VendorTable;
use pipeline::{CaptureSpan, Pipeline};
use report::writer::ReportWriter;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Entries per category in the closing summary line.
const SUMMARY_TOP: usize = 5;

type ShutdownFlag = Arc<AtomicBool>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger: SharedLogger = match Logger::new(cli.json, cli.log_file.as_deref()) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            eprintln!("wirelens: cannot open log file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger.log(&Event::Error { message: &e.to_string() });
            ExitCode::FAILURE
        }
    }
}

/// One batch run: configure, read, aggregate, write.
fn run(cli: &Cli, logger: &SharedLogger) -> Result<()> {
    let started = Instant::now();

    // Configuration problems are fatal before anything is read.
    let cfg = cli.run_config();
    cfg.validate()?;

    let vendors = load_vendors(&cli.oui, logger);

    let mut source = PcapSource::open(&cli.pcap_file)?;
    logger.log(&Event::Info {
        message: &format!("Reading {} ({:?} link layer)", cli.pcap_file, source.link()),
    });
    if let LinkKind::Unsupported(code) = source.link() {
        logger.log(&Event::Warning {
            message: &format!("Link type {} is not decoded; every frame will count as a parse error", code),
        });
    }

    let shutdown: ShutdownFlag = Arc::new(AtomicBool::new(false));
    register_shutdown_handler(Arc::clone(&shutdown), Arc::clone(logger));

    let selected = select_for(until_shutdown(source.by_ref(), &shutdown), &cfg);
    let pipeline = if cfg.workers > 1 {
        let items: Vec<_> = selected.collect();
        logger.log(&Event::Info {
            message: &format!("Aggregating {} packets on {} workers", items.len(), cfg.workers),
        });
        run_sharded(items, &cfg, &vendors)
    } else {
        let mut p = Pipeline::new(cfg.clone(), &vendors);
        if cli.verbose {
            p = p.with_logger(Arc::clone(logger));
        }
        p.run(selected)
    };

    if shutdown.load(Ordering::SeqCst) {
        logger.log(&Event::Warning { message: "Interrupted; writing a partial report" });
    }
    if let Some(e) = source.read_error() {
        logger.log(&Event::Warning {
            message: &format!("Capture read stopped early: {}", e),
        });
    }

    let report = pipeline.report().with_input(cli.pcap_file.as_str());
    let writer = ReportWriter::create(&cli.outdir)?;
    logger.log(&Event::Info {
        message: &format!("Writing report to {}", writer.outdir().display()),
    });
    for written in writer.write(&report)? {
        logger.log(&Event::ReportWritten {
            path: &written.path.display().to_string(),
            rows: written.rows,
        });
    }

    log_capture_window(logger, pipeline.span());
    let top_dns = report.summary.dns_queries.leading_keys(SUMMARY_TOP);
    let top_sni = report.summary.tls_sni.leading_keys(SUMMARY_TOP);
    logger.log(&Event::RunSummary {
        packets_processed: pipeline.packets(),
        parse_errors:      pipeline.parse_errors(),
        devices:           pipeline.devices().len(),
        dns_queries:       pipeline.name_queries().len(),
        tls_hostnames:     pipeline.handshake_hostnames().len(),
        http_requests:     pipeline.plaintext_requests().len(),
        duration_ms:       started.elapsed().as_millis(),
        top_dns:           &top_dns,
        top_sni:           &top_sni,
    });
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Loads the vendor table. A missing or unreadable file only disables vendor
/// names.
fn load_vendors(path: &str, logger: &SharedLogger) -> VendorTable {
    logger.log(&Event::Info { message: "Loading vendor table..." });
    match VendorTable::load(Path::new(path)) {
        Ok(table) if table.is_empty() => {
            logger.log(&Event::Warning {
                message: &format!("No vendor prefixes found in {}; vendors will read \"unknown\"", path),
            });
            table
        }
        Ok(table) => {
            logger.log(&Event::Info {
                message: &format!("Loaded {} vendor prefixes from {}", table.len(), path),
            });
            table
        }
        Err(e) => {
            logger.log(&Event::Warning {
                message: &format!("Could not load {} ({}); vendors will read \"unknown\"", path, e),
            });
            VendorTable::empty()
        }
    }
}

/// Ctrl+C stops reading at the next packet boundary; the report is still written.
fn register_shutdown_handler(shutdown: ShutdownFlag, logger: SharedLogger) {
    let handler_logger = Arc::clone(&logger);
    let installed = ctrlc::set_handler(move || {
        handler_logger.log(&Event::Warning { message: "Ctrl+C received, finishing up..." });
        shutdown.store(true, Ordering::SeqCst);
    });
    if let Err(e) = installed {
        logger.log(&Event::Warning {
            message: &format!("Could not install Ctrl+C handler: {}", e),
        });
    }
}

/// Logs the capture window in readable UTC. Kept out of the report files.
fn log_capture_window(logger: &SharedLogger, span: Option<CaptureSpan>) {
    let message = match span {
        Some(span) => format!("Capture window {} to {}", utc(span.first), utc(span.last)),
        None => "Capture contained no decodable packets".to_string(),
    };
    logger.log(&Event::Info { message: &message });
}

fn utc(ts: Timestamp) -> String {
    let micros = ts.as_micros();
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    match Utc.timestamp_opt(secs, nanos).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string(),
        None => ts.to_string(),
    }
}
