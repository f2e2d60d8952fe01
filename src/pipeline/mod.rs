//! Metadata aggregation pipeline.
//!
//! A [`Pipeline`] is the context of one run: it is created before the first
//! packet is read, receives every selected packet exactly once, and is
//! reduced into a report when the source is exhausted. Nothing it owns
//! outlives the run.
//!
//! Per packet, in order: the device tracker (source hardware address only),
//! each enabled category extractor, the protocol histogram, the timeline and
//! the capture span. Decode failures only bump the parse-error counter.

pub mod config;
pub mod counters;
pub mod devices;
pub mod extractors;
pub mod sampling;
pub mod shard;
pub mod topn;
pub mod types;
pub mod vendor;

use crate::error::DecodeError;
use crate::logger::{Event, SharedLogger};
use crate::pipeline::config::RunConfig;
use crate::pipeline::counters::{ProtocolHistogram, Timeline};
use crate::pipeline::devices::{is_trackable, DeviceTracker};
use crate::pipeline::extractors::*;
use crate::pipeline::types::{PacketSummary, Timestamp};
use crate::pipeline::vendor::VendorTable;
use crate::report::{self, Report};

/// First and last timestamp among processed packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSpan {
    pub first: Timestamp,
    pub last:  Timestamp,
}

impl CaptureSpan {
    fn widen(span: Option<CaptureSpan>, ts: Timestamp) -> CaptureSpan {
        match span {
            Some(s) => CaptureSpan { first: s.first.min(ts), last: s.last.max(ts) },
            None => CaptureSpan { first: ts, last: ts },
        }
    }

    fn union(a: Option<CaptureSpan>, b: Option<CaptureSpan>) -> Option<CaptureSpan> {
        match (a, b) {
            (Some(a), Some(b)) => Some(CaptureSpan {
                first: a.first.min(b.first),
                last:  a.last.max(b.last),
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Aggregation context for one run over one capture.
pub struct Pipeline<'v> {
    cfg:          RunConfig,
    vendors:      &'v VendorTable,
    logger:       Option<SharedLogger>,
    devices:      DeviceTracker,
    dns:          EventLog<NameQueries>,
    tls:          EventLog<HandshakeHostnames>,
    http:         EventLog<PlaintextRequests>,
    protocols:    ProtocolHistogram,
    timeline:     Timeline,
    span:         Option<CaptureSpan>,
    packets:      u64,
    parse_errors: u64,
}

impl<'v> Pipeline<'v> {
    pub fn new(cfg: RunConfig, vendors: &'v VendorTable) -> Self {
        let timeline = Timeline::new(cfg.resolution);
        Self {
            cfg,
            vendors,
            logger: None,
            devices: DeviceTracker::new(),
            dns: EventLog::new(),
            tls: EventLog::new(),
            http: EventLog::new(),
            protocols: ProtocolHistogram::new(),
            timeline,
            span: None,
            packets: 0,
            parse_errors: 0,
        }
    }

    /// Emits a log line the first time each device, domain, SNI hostname
    /// and HTTP host shows up.
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Feeds every item of `source` through the pipeline.
    pub fn run<I>(mut self, source: I) -> Self
    where
        I: IntoIterator<Item = Result<PacketSummary, DecodeError>>,
    {
        for item in source {
            self.offer(item);
        }
        self
    }

    /// Accepts one item from the decoder, successful or not.
    pub fn offer(&mut self, item: Result<PacketSummary, DecodeError>) {
        match item {
            Ok(packet) => self.observe(&packet),
            Err(_) => self.record_parse_error(),
        }
    }

    pub fn record_parse_error(&mut self) {
        self.parse_errors += 1;
    }

    /// Updates every aggregate with one decoded packet.
    pub fn observe(&mut self, packet: &PacketSummary) {
        self.packets += 1;
        self.span = Some(CaptureSpan::widen(self.span, packet.timestamp));

        if self.cfg.track_devices {
            if let Some(mac) = packet.src_mac.filter(is_trackable) {
                let is_new = self.devices.observe(mac, packet.src_ip, packet.timestamp, self.vendors);
                if is_new {
                    if let (Some(logger), Some(device)) = (&self.logger, self.devices.get(&mac)) {
                        logger.log(&Event::DeviceDiscovered {
                            mac:    &mac.to_string(),
                            vendor: &device.vendor,
                            ip:     &display_ip(packet.src_ip),
                        });
                    }
                }
            }
        }

        if self.cfg.categories.dns && self.dns.observe(packet) == Some(Sighting::First) {
            if let (Some(logger), Some(e)) = (&self.logger, self.dns.last()) {
                logger.log(&Event::Dns { src: &display_ip(e.client), domain: &e.query });
            }
        }
        if self.cfg.categories.tls && self.tls.observe(packet) == Some(Sighting::First) {
            if let (Some(logger), Some(e)) = (&self.logger, self.tls.last()) {
                logger.log(&Event::TlsSni { src: &display_ip(e.src), sni: &e.hostname });
            }
        }
        if self.cfg.categories.http && self.http.observe(packet) == Some(Sighting::First) {
            if let (Some(logger), Some(e)) = (&self.logger, self.http.last()) {
                logger.log(&Event::HttpRequest {
                    src:    &display_ip(e.src),
                    host:   &e.host,
                    method: &e.method,
                    uri:    &e.uri,
                });
            }
        }

        self.protocols.tally(&packet.protocol);
        self.timeline.bucket(packet.timestamp);
    }

    /// Folds a pipeline that processed a later part of the same stream into
    /// this one. Counts add, spans widen, address sets union and event logs
    /// concatenate, so merging contiguous shards in order matches a single pass.
    pub fn merge(&mut self, other: Pipeline<'_>) {
        self.devices.merge(other.devices);
        self.dns.merge(other.dns);
        self.tls.merge(other.tls);
        self.http.merge(other.http);
        self.protocols.merge(other.protocols);
        self.timeline.merge(other.timeline);
        self.span = CaptureSpan::union(self.span, other.span);
        self.packets += other.packets;
        self.parse_errors += other.parse_errors;
    }

    /// Reduces the finished aggregates into tables and a summary document.
    pub fn report(&self) -> Report {
        report::assemble(self)
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    pub fn devices(&self) -> &DeviceTracker {
        &self.devices
    }

    pub fn name_queries(&self) -> &EventLog<NameQueries> {
        &self.dns
    }

    pub fn handshake_hostnames(&self) -> &EventLog<HandshakeHostnames> {
        &self.tls
    }

    pub fn plaintext_requests(&self) -> &EventLog<PlaintextRequests> {
        &self.http
    }

    pub fn protocols(&self) -> &ProtocolHistogram {
        &self.protocols
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn span(&self) -> Option<CaptureSpan> {
        self.span
    }

    /// Packets that decoded successfully and were aggregated.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }
}

pub(crate) fn display_ip(ip: Option<std::net::IpAddr>) -> String {
    ip.map(|ip| ip.to_string()).unwrap_or_default()
}
