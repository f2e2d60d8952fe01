//! Report assembly.
//!
//! Runs once after the pass and only reads the pipeline's aggregates. Every
//! externally visible ordering is produced here by an explicit sort so the
//! output never depends on hash-map iteration order.

pub mod writer;

use crate::pipeline::config::Resolution;
use crate::pipeline::extractors::{EventLog, Extractor};
use crate::pipeline::topn::{self, TopEntry};
use crate::pipeline::types::Timestamp;
use crate::pipeline::{display_ip, Pipeline};
use serde::Serialize;

/// Static remarks carried in every summary for the reader of the report.
const NOTES: [&str; 4] = [
    "Vendor inference uses the IEEE OUI prefix of each source hardware address.",
    "SNI is visible in the TLS ClientHello unless Encrypted Client Hello is used.",
    "DNS queries leak domains unless DNS-over-HTTPS or DNS-over-TLS is enforced.",
    "Plaintext HTTP exposes hosts, paths, user agents and the presence of credentials.",
];

// ── Flat tables ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRow {
    pub mac:              String,
    pub vendor:           String,
    pub randomized:       bool,
    /// Observed network addresses joined with `;`.
    pub ips_seen:         String,
    pub first_seen_epoch: String,
    pub last_seen_epoch:  String,
    pub packet_count:     u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRow {
    pub time_epoch: String,
    pub client_ip:  String,
    pub query:      String,
    pub qtype:      String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsRow {
    pub time_epoch:   String,
    pub src_ip:       String,
    pub dst_ip:       String,
    pub sni_hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpRow {
    pub time_epoch:      String,
    pub src_ip:          String,
    pub host:            String,
    pub method:          String,
    pub uri:             String,
    pub user_agent:      String,
    pub has_auth_header: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolRow {
    pub protocol:     String,
    pub packet_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineRow {
    pub bucket_start_epoch: i64,
    pub packet_count:       u64,
}

/// One table per artifact, rows already in output order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tables {
    pub devices:   Vec<DeviceRow>,
    pub dns:       Vec<DnsRow>,
    pub tls:       Vec<TlsRow>,
    pub http:      Vec<HttpRow>,
    pub protocols: Vec<ProtocolRow>,
    pub timeline:  Vec<TimelineRow>,
}

// ── Summary document ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpanView {
    pub first: Timestamp,
    pub last:  Timestamp,
}

/// Per-category section of the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryView {
    Observed {
        events:   usize,
        distinct: usize,
        top:      Vec<TopEntry>,
    },
    /// Nothing of this kind in the processed packets, or the extractor was off.
    NoTraffic { disabled: bool },
}

impl CategoryView {
    fn build<X: Extractor>(log: &EventLog<X>, enabled: bool, n: usize) -> Self {
        if !enabled || log.is_empty() {
            return CategoryView::NoTraffic { disabled: !enabled };
        }
        let counts = topn::group(log.keys());
        CategoryView::Observed {
            events:   log.len(),
            distinct: counts.len(),
            top:      topn::top_n(&counts, n),
        }
    }

    /// Keys of the first `n` ranked entries; empty when there was no traffic.
    pub fn leading_keys(&self, n: usize) -> Vec<&str> {
        match self {
            CategoryView::Observed { top, .. } => top.iter().take(n).map(|e| e.key.as_str()).collect(),
            CategoryView::NoTraffic { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryDocument {
    pub input_pcap:        Option<String>,
    pub resolution:        Resolution,
    pub top_n:             usize,
    pub processed_packets: u64,
    pub parse_errors:      u64,
    /// `None` when no packet was processed.
    pub time_span_epoch:   Option<SpanView>,
    pub device_count:      usize,
    pub dns_queries:       CategoryView,
    pub tls_sni:           CategoryView,
    pub http_hosts:        CategoryView,
    pub top_protocols:     Vec<TopEntry>,
    pub protocol_mix:      Vec<TopEntry>,
    pub timeline:          Vec<TimelineRow>,
    pub notes:             Vec<String>,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub summary: SummaryDocument,
    pub tables:  Tables,
}

impl Report {
    /// Records which capture the report was built from.
    pub fn with_input(mut self, path: impl Into<String>) -> Self {
        self.summary.input_pcap = Some(path.into());
        self
    }
}

/// Reduces a finished pipeline into tables and a summary document.
pub fn assemble(p: &Pipeline<'_>) -> Report {
    let cfg = p.config();
    let n = cfg.top_n;

    let mut devices: Vec<_> = p.devices().records().collect();
    devices.sort_by(|a, b| {
        b.packet_count
            .cmp(&a.packet_count)
            .then_with(|| a.mac.to_string().cmp(&b.mac.to_string()))
    });
    let devices = devices
        .into_iter()
        .map(|d| DeviceRow {
            mac:              d.mac.to_string(),
            vendor:           d.vendor.clone(),
            randomized:       d.randomized,
            ips_seen:         d.addresses.iter().map(|ip| ip.to_string()).collect::<Vec<_>>().join(";"),
            first_seen_epoch: d.first_seen.to_string(),
            last_seen_epoch:  d.last_seen.to_string(),
            packet_count:     d.packet_count,
        })
        .collect();

    let dns = p
        .name_queries()
        .events()
        .iter()
        .map(|e| DnsRow {
            time_epoch: e.timestamp.to_string(),
            client_ip:  display_ip(e.client),
            query:      e.query.clone(),
            qtype:      e.record_type.clone(),
        })
        .collect();

    let tls = p
        .handshake_hostnames()
        .events()
        .iter()
        .map(|e| TlsRow {
            time_epoch:   e.timestamp.to_string(),
            src_ip:       display_ip(e.src),
            dst_ip:       display_ip(e.dst),
            sni_hostname: e.hostname.clone(),
        })
        .collect();

    let http = p
        .plaintext_requests()
        .events()
        .iter()
        .map(|e| HttpRow {
            time_epoch:      e.timestamp.to_string(),
            src_ip:          display_ip(e.src),
            host:            e.host.clone(),
            method:          e.method.clone(),
            uri:             e.uri.clone(),
            user_agent:      e.user_agent.clone(),
            has_auth_header: e.has_authorization,
        })
        .collect();

    let protocol_mix = topn::rank(p.protocols().counts());
    let protocols = protocol_mix
        .iter()
        .map(|e| ProtocolRow { protocol: e.key.clone(), packet_count: e.count })
        .collect();

    let timeline: Vec<TimelineRow> = p
        .timeline()
        .sorted()
        .into_iter()
        .map(|(start, count)| TimelineRow { bucket_start_epoch: start, packet_count: count })
        .collect();

    let summary = SummaryDocument {
        input_pcap:        None,
        resolution:        p.timeline().resolution(),
        top_n:             n,
        processed_packets: p.packets(),
        parse_errors:      p.parse_errors(),
        time_span_epoch:   p.span().map(|s| SpanView { first: s.first, last: s.last }),
        device_count:      p.devices().len(),
        dns_queries:       CategoryView::build(p.name_queries(), cfg.categories.dns, n),
        tls_sni:           CategoryView::build(p.handshake_hostnames(), cfg.categories.tls, n),
        http_hosts:        CategoryView::build(p.plaintext_requests(), cfg.categories.http, n),
        top_protocols:     protocol_mix.iter().take(n).cloned().collect(),
        protocol_mix,
        timeline:          timeline.clone(),
        notes:             NOTES.iter().map(|s| s.to_string()).collect(),
    };

    Report {
        summary,
        tables: Tables { devices, dns, tls, http, protocols, timeline },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::pipeline::config::{Categories, RunConfig};
    use crate::pipeline::sampling::select_for;
    use crate::pipeline::tests::{dns, mixed, packet, Item};
    use crate::pipeline::vendor::VendorTable;

    #[test]
    fn test_empty_capture() {
        let vendors = VendorTable::empty();
        let report = Pipeline::new(RunConfig::default(), &vendors).run(Vec::<Item>::new()).report();

        assert_eq!(report.tables, Tables::default());
        let s = &report.summary;
        assert_eq!(s.device_count, 0);
        assert_eq!(s.processed_packets, 0);
        assert_eq!(s.time_span_epoch, None);
        assert_eq!(s.dns_queries, CategoryView::NoTraffic { disabled: false });
        assert_eq!(s.tls_sni, CategoryView::NoTraffic { disabled: false });
        assert_eq!(s.http_hosts, CategoryView::NoTraffic { disabled: false });
        assert!(s.protocol_mix.is_empty());
        assert!(s.timeline.is_empty());
    }

    #[test]
    fn test_top_one_domain() {
        let vendors = VendorTable::empty();
        let cfg = RunConfig { top_n: 1, ..RunConfig::default() };
        let report = Pipeline::new(cfg, &vendors)
            .run(vec![dns(0, "x.com"), dns(1, "y.com"), dns(2, "x.com")].into_iter().map(Ok::<_, DecodeError>))
            .report();

        match &report.summary.dns_queries {
            CategoryView::Observed { events, distinct, top } => {
                assert_eq!(*events, 3);
                assert_eq!(*distinct, 2);
                assert_eq!(top, &vec![TopEntry::new("x.com", 2)]);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_disabled_category_is_marked() {
        let vendors = VendorTable::empty();
        let cfg = RunConfig {
            categories: Categories { tls: false, ..Categories::default() },
            ..RunConfig::default()
        };
        let report = Pipeline::new(cfg, &vendors).run(mixed()).report();
        assert!(report.tables.tls.is_empty());
        assert_eq!(report.summary.tls_sni, CategoryView::NoTraffic { disabled: true });
        assert!(matches!(report.summary.dns_queries, CategoryView::Observed { .. }));
        assert!(report.summary.tls_sni.leading_keys(5).is_empty());
    }

    #[test]
    fn test_leading_keys_follow_rank() {
        let vendors = VendorTable::empty();
        let report = Pipeline::new(RunConfig::default(), &vendors).run(mixed()).report();
        assert_eq!(report.summary.dns_queries.leading_keys(5), vec!["x.com", "y.com"]);
        assert_eq!(report.summary.dns_queries.leading_keys(1), vec!["x.com"]);
        assert_eq!(report.summary.tls_sni.leading_keys(5), vec!["mail.example.org"]);
    }

    #[test]
    fn test_tables_are_ordered() {
        let vendors = VendorTable::empty();
        let report = Pipeline::new(RunConfig::default(), &vendors).run(mixed()).report();

        let counts: Vec<u64> = report.tables.devices.iter().map(|d| d.packet_count).collect();
        assert_eq!(counts, vec![3, 2, 1, 1]);
        assert!(report.tables.devices[2].mac < report.tables.devices[3].mac);

        let protocols: Vec<(&str, u64)> = report
            .tables
            .protocols
            .iter()
            .map(|r| (r.protocol.as_str(), r.packet_count))
            .collect();
        assert_eq!(protocols, vec![("DNS", 3), ("TLS", 2), ("HTTP", 1), ("TCP", 1)]);

        let starts: Vec<i64> = report.tables.timeline.iter().map(|r| r.bucket_start_epoch).collect();
        assert_eq!(starts, vec![0, 60, 120]);

        assert_eq!(report.tables.dns[0].time_epoch, "0.000000");
        assert_eq!(report.tables.dns[0].client_ip, "192.168.0.10");
        assert_eq!(report.tables.http[0].user_agent, "curl/8.0");
    }

    #[test]
    fn test_sampling_reflects_only_kept_packets() {
        let vendors = VendorTable::empty();
        let input: Vec<Item> = (0..10).map(|t| Ok(packet(t, 1, 1, "UDP"))).collect();
        let cfg = RunConfig { stride: 3, ..RunConfig::default() };
        let p = Pipeline::new(cfg.clone(), &vendors).run(select_for(input.into_iter(), &cfg));
        let report = p.report();

        assert_eq!(report.summary.processed_packets, 4);
        assert_eq!(
            report.summary.time_span_epoch,
            Some(SpanView { first: Timestamp::from_secs(0), last: Timestamp::from_secs(9) })
        );
    }

    #[test]
    fn test_limit_reflects_only_kept_packets() {
        let vendors = VendorTable::empty();
        let input: Vec<Item> = (0..10).map(|t| Ok(packet(t, 1, 1, "UDP"))).collect();
        let cfg = RunConfig { limit: Some(4), ..RunConfig::default() };
        let report = Pipeline::new(cfg.clone(), &vendors)
            .run(select_for(input.into_iter(), &cfg))
            .report();

        assert_eq!(report.summary.processed_packets, 4);
        assert_eq!(report.tables.devices[0].last_seen_epoch, "3.000000");
        assert_eq!(
            report.summary.time_span_epoch.map(|s| s.last),
            Some(Timestamp::from_secs(3))
        );
    }

    #[test]
    fn test_limit_counts_only_decoded_packets() {
        let vendors = VendorTable::empty();
        let input: Vec<Item> = vec![
            Ok(packet(0, 1, 1, "UDP")),
            Err(DecodeError::Malformed("short frame".into())),
            Ok(packet(1, 1, 1, "UDP")),
            Ok(packet(2, 1, 1, "UDP")),
            Ok(packet(3, 1, 1, "UDP")),
        ];
        let cfg = RunConfig { limit: Some(3), ..RunConfig::default() };
        let report = Pipeline::new(cfg.clone(), &vendors)
            .run(select_for(input.into_iter(), &cfg))
            .report();

        assert_eq!(report.summary.processed_packets, 3);
        assert_eq!(report.summary.parse_errors, 1);
        assert_eq!(
            report.summary.time_span_epoch.map(|s| s.last),
            Some(Timestamp::from_secs(2))
        );
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let vendors = VendorTable::empty();
        let a = Pipeline::new(RunConfig::default(), &vendors).run(mixed()).report();
        let b = Pipeline::new(RunConfig::default(), &vendors).run(mixed()).report();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.summary).unwrap(),
            serde_json::to_string(&b.summary).unwrap()
        );
    }

    #[test]
    fn test_summary_json_shape() {
        let vendors = VendorTable::empty();
        let report = Pipeline::new(RunConfig::default(), &vendors).run(Vec::<Item>::new()).report();
        let json = serde_json::to_value(&report.summary).unwrap();

        assert!(json["time_span_epoch"].is_null());
        assert_eq!(json["dns_queries"]["status"], "no_traffic");
        assert_eq!(json["resolution"], "minute");
    }
}
