//! Offline capture reader and frame decoder.
//!
//! [`PcapSource`] replays a saved pcap file frame by frame and decodes each
//! frame into a [`PacketSummary`]. Layer slicing is done by `etherparse`; the
//! application-layer metadata (DNS question, TLS SNI, HTTP request head, ARP
//! sender) comes from [`parsers`]. A frame that cannot be sliced becomes a
//! [`DecodeError`] in the stream rather than ending it.

pub mod parsers;

use crate::error::{DecodeError, Error};
use crate::pipeline::types::{NameQuery, PacketSummary, Timestamp, TlsHello};
use etherparse::{InternetSlice, LinkSlice, SlicedPacket, TransportSlice};
use pcap::{Capture, Linktype, Offline};
use pnet::util::MacAddr;
use std::net::IpAddr;

const ETHERTYPE_ARP: u16 = 0x0806;
const DNS_PORT: u16 = 53;

/// How frames of a capture are framed at the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    /// Frames start directly with an IPv4 or IPv6 header.
    RawIp,
    Unsupported(i32),
}

impl LinkKind {
    pub fn from_linktype(link: Linktype) -> Self {
        match link.0 {
            1 => LinkKind::Ethernet,
            // LINKTYPE_RAW is 101 in files; 12 and 14 are the platform DLT
            // values some writers store instead.
            12 | 14 | 101 | 228 | 229 => LinkKind::RawIp,
            other => LinkKind::Unsupported(other),
        }
    }
}

// ── PCAP file replay ──────────────────────────────────────────────────────────

/// Iterator over the decoded frames of a pcap file, in file order.
///
/// The stream ends at end of file. A read error also ends it; the error is
/// kept and can be inspected afterwards with [`PcapSource::read_error`].
pub struct PcapSource {
    capture:    Capture<Offline>,
    link:       LinkKind,
    read_error: Option<pcap::Error>,
}

impl PcapSource {
    /// Opens `path` for offline reading.
    ///
    /// # Errors
    /// Returns [`Error::Capture`] if the file is missing or not a capture.
    pub fn open(path: &str) -> crate::error::Result<Self> {
        let capture = Capture::from_file(path).map_err(|source| Error::Capture {
            path: path.to_string(),
            source,
        })?;
        let link = LinkKind::from_linktype(capture.get_datalink());
        Ok(Self { capture, link, read_error: None })
    }

    pub fn link(&self) -> LinkKind {
        self.link
    }

    /// The error that cut the stream short, if any.
    pub fn read_error(&self) -> Option<&pcap::Error> {
        self.read_error.as_ref()
    }
}

impl Iterator for PcapSource {
    type Item = Result<PacketSummary, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.read_error.is_some() {
            return None;
        }
        match self.capture.next_packet() {
            Ok(pkt) => {
                let ts = Timestamp::from_timeval(
                    pkt.header.ts.tv_sec as i64,
                    pkt.header.ts.tv_usec as i64,
                );
                Some(decode_frame(self.link, ts, pkt.data))
            }
            Err(pcap::Error::NoMorePackets) => None,
            Err(e) => {
                self.read_error = Some(e);
                None
            }
        }
    }
}

// ── Frame decoding ────────────────────────────────────────────────────────────

/// Decodes one captured frame into a [`PacketSummary`].
///
/// The protocol label is the highest layer recognised: `ARP`, `DNS`, `TLS`,
/// `HTTP`, then `TCP`/`UDP`/`ICMP`/`ICMPv6`, then `IPv4`/`IPv6`, then `ETH`.
pub fn decode_frame(
    link:      LinkKind,
    timestamp: Timestamp,
    data:      &[u8],
) -> Result<PacketSummary, DecodeError> {
    let sliced = match link {
        LinkKind::Ethernet => SlicedPacket::from_ethernet(data),
        LinkKind::RawIp => SlicedPacket::from_ip(data),
        LinkKind::Unsupported(code) => return Err(DecodeError::UnsupportedLinkType(code)),
    }
    .map_err(|e| DecodeError::Malformed(format!("{:?}", e)))?;

    let mut summary = PacketSummary::new(timestamp, "ETH");

    let mut ether_type = None;
    if let Some(LinkSlice::Ethernet2(eth)) = &sliced.link {
        summary.src_mac = Some(mac(eth.source()));
        summary.dst_mac = Some(mac(eth.destination()));
        ether_type = Some(eth.ether_type());
    }

    if ether_type == Some(ETHERTYPE_ARP) {
        summary.protocol = "ARP".to_string();
        summary.src_ip = parsers::parse_arp_sender(sliced.payload).map(IpAddr::V4);
        return Ok(summary);
    }

    match &sliced.ip {
        Some(InternetSlice::Ipv4(h, _)) => {
            summary.src_ip = Some(IpAddr::V4(h.source_addr()));
            summary.dst_ip = Some(IpAddr::V4(h.destination_addr()));
            summary.protocol = "IPv4".to_string();
        }
        Some(InternetSlice::Ipv6(h, _)) => {
            summary.src_ip = Some(IpAddr::V6(h.source_addr()));
            summary.dst_ip = Some(IpAddr::V6(h.destination_addr()));
            summary.protocol = "IPv6".to_string();
        }
        None => {}
    }

    let payload = sliced.payload;
    match &sliced.transport {
        Some(TransportSlice::Udp(udp)) => {
            summary.protocol = "UDP".to_string();
            if udp.source_port() == DNS_PORT || udp.destination_port() == DNS_PORT {
                if let Some(msg) = parsers::parse_dns(payload) {
                    summary.protocol = "DNS".to_string();
                    if !msg.is_response {
                        summary.name_query = msg.question.map(|(name, qtype)| NameQuery {
                            name,
                            record_type: parsers::record_type_name(qtype),
                        });
                    }
                }
            }
        }
        Some(TransportSlice::Tcp(_)) => {
            summary.protocol = "TCP".to_string();
            if let Some(req) = parsers::parse_http_request(payload) {
                summary.protocol = "HTTP".to_string();
                summary.http_request = Some(req);
            } else if parsers::is_http_response(payload) {
                summary.protocol = "HTTP".to_string();
            } else if parsers::is_tls_record(payload) {
                summary.protocol = "TLS".to_string();
                summary.tls_hello =
                    parsers::parse_tls_sni(payload).map(|server_name| TlsHello { server_name });
            }
        }
        Some(TransportSlice::Icmpv4(_)) => summary.protocol = "ICMP".to_string(),
        Some(TransportSlice::Icmpv6(_)) => summary.protocol = "ICMPv6".to_string(),
        Some(TransportSlice::Unknown(_)) | None => {}
    }

    Ok(summary)
}

fn mac(b: [u8; 6]) -> MacAddr {
    MacAddr::new(b[0], b[1], b[2], b[3], b[4], b[5])
}

#[cfg(test)]
mod tests {
    use super::parsers::tests::{client_hello, dns_query};
    use super::*;
    use etherparse::PacketBuilder;
    use std::io::Write;
    use std::net::Ipv4Addr;

    const CLIENT_MAC: [u8; 6] = [0x00, 0x1b, 0x63, 0x11, 0x22, 0x33];
    const GATEWAY_MAC: [u8; 6] = [0x3c, 0x22, 0xfb, 0x00, 0x00, 0x01];

    fn udp_frame(dport: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(CLIENT_MAC, GATEWAY_MAC)
            .ipv4([192, 168, 1, 20], [192, 168, 1, 1], 64)
            .udp(50000, dport);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    fn tcp_frame(dport: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(CLIENT_MAC, GATEWAY_MAC)
            .ipv4([192, 168, 1, 20], [93, 184, 216, 34], 64)
            .tcp(50001, dport, 1, 64240);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    fn decode(frame: &[u8]) -> PacketSummary {
        decode_frame(LinkKind::Ethernet, Timestamp::from_secs(100), frame).unwrap()
    }

    #[test]
    fn test_decode_dns_query() {
        let p = decode(&udp_frame(53, &dns_query("example.com", 1)));
        assert_eq!(p.protocol, "DNS");
        assert_eq!(p.src_mac, Some(mac(CLIENT_MAC)));
        assert_eq!(p.src_ip, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))));
        let q = p.name_query.unwrap();
        assert_eq!(q.name, "example.com");
        assert_eq!(q.record_type, "A");
    }

    #[test]
    fn test_dns_response_has_no_query() {
        let mut msg = dns_query("example.com", 1);
        msg[2] |= 0x80;
        let p = decode(&udp_frame(53, &msg));
        assert_eq!(p.protocol, "DNS");
        assert!(p.name_query.is_none());
    }

    #[test]
    fn test_decode_plain_udp() {
        let p = decode(&udp_frame(5353, b"\x00\x01"));
        assert_eq!(p.protocol, "UDP");
        assert!(p.name_query.is_none());
    }

    #[test]
    fn test_decode_tls_client_hello() {
        let p = decode(&tcp_frame(443, &client_hello("mail.example.org")));
        assert_eq!(p.protocol, "TLS");
        assert_eq!(p.tls_hello.unwrap().server_name, "mail.example.org");
    }

    #[test]
    fn test_decode_http_request() {
        let p = decode(&tcp_frame(80, b"POST /login HTTP/1.1\r\nHost: intranet.local\r\n\r\n"));
        assert_eq!(p.protocol, "HTTP");
        let req = p.http_request.unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.host.as_deref(), Some("intranet.local"));
    }

    #[test]
    fn test_decode_bare_tcp() {
        let p = decode(&tcp_frame(22, b""));
        assert_eq!(p.protocol, "TCP");
        assert!(p.http_request.is_none() && p.tls_hello.is_none());
    }

    fn arp_frame(sender_ip: [u8; 4]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0xff; 6]);
        frame.extend_from_slice(&CLIENT_MAC);
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[0, 1, 0x08, 0x00, 6, 4, 0, 1]);
        frame.extend_from_slice(&CLIENT_MAC);
        frame.extend_from_slice(&sender_ip);
        frame.extend_from_slice(&[0; 6]);
        frame.extend_from_slice(&[192, 168, 1, 1]);
        frame
    }

    #[test]
    fn test_decode_arp() {
        let p = decode(&arp_frame([192, 168, 1, 20]));
        assert_eq!(p.protocol, "ARP");
        assert_eq!(p.src_ip, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))));
        assert_eq!(p.dst_mac, Some(MacAddr::broadcast()));
    }

    #[test]
    fn test_unspecified_arp_sender_leaves_source_ip_empty() {
        let p = decode(&arp_frame([0, 0, 0, 0]));
        assert_eq!(p.protocol, "ARP");
        assert_eq!(p.src_mac, Some(mac(CLIENT_MAC)));
        assert_eq!(p.src_ip, None);
    }

    #[test]
    fn test_decode_raw_ip() {
        let builder = PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64).udp(1000, 2000);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"hi").unwrap();

        let p = decode_frame(LinkKind::RawIp, Timestamp::from_secs(1), &frame).unwrap();
        assert_eq!(p.protocol, "UDP");
        assert_eq!(p.src_mac, None);
        assert_eq!(p.dst_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
    }

    #[test]
    fn test_decode_errors() {
        let ts = Timestamp::from_secs(0);
        assert!(matches!(
            decode_frame(LinkKind::Ethernet, ts, &[0x00, 0x01, 0x02]),
            Err(DecodeError::Malformed(_))
        ));
        assert_eq!(
            decode_frame(LinkKind::Unsupported(105), ts, &[0u8; 64]),
            Err(DecodeError::UnsupportedLinkType(105))
        );
    }

    #[test]
    fn test_link_kinds() {
        assert_eq!(LinkKind::from_linktype(Linktype(1)), LinkKind::Ethernet);
        assert_eq!(LinkKind::from_linktype(Linktype(101)), LinkKind::RawIp);
        assert_eq!(LinkKind::from_linktype(Linktype(127)), LinkKind::Unsupported(127));
    }

    /// Writes a little-endian pcap file with an Ethernet link type.
    fn write_pcap(frames: &[(u32, u32, Vec<u8>)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        for (secs, micros, data) in frames {
            out.extend_from_slice(&secs.to_le_bytes());
            out.extend_from_slice(&micros.to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        file.write_all(&out).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_pcap_source_reads_in_order() {
        let file = write_pcap(&[
            (1_700_000_000, 250_000, udp_frame(53, &dns_query("x.com", 28))),
            (1_700_000_001, 0, vec![0xde, 0xad]),
            (1_700_000_002, 5, tcp_frame(443, &client_hello("y.com"))),
        ]);

        let source = PcapSource::open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(source.link(), LinkKind::Ethernet);
        let items: Vec<_> = source.collect();
        assert_eq!(items.len(), 3);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first.timestamp, Timestamp::from_timeval(1_700_000_000, 250_000));
        assert_eq!(first.name_query.as_ref().unwrap().record_type, "AAAA");
        assert!(items[1].is_err());
        assert_eq!(items[2].as_ref().unwrap().protocol, "TLS");
    }

    #[test]
    fn test_open_missing_file() {
        let err = PcapSource::open("/nonexistent/capture.pcap").err().unwrap();
        assert!(matches!(err, Error::Capture { .. }));
    }
}
