//! Metadata parsers for DNS questions, TLS ClientHello SNI, HTTP request
//! heads and ARP sender bindings.
//!
//! Each parser reads only the handshake or header bytes an on-path observer
//! sees in clear text and returns `None` on anything it does not recognise.

use crate::pipeline::types::HttpRequest;
use pnet::packet::arp::{ArpHardwareTypes, ArpPacket};
use pnet::packet::ethernet::EtherTypes;
use std::net::Ipv4Addr;

/// Longest DNS name allowed on the wire.
const MAX_DNS_NAME: usize = 255;

/// Request methods recognised at the start of a TCP payload.
const HTTP_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];

/// Bounds-checked forward reader over a byte slice.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn u16(&mut self) -> Option<u16> {
        let b = self.take(2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Option<usize> {
        let b = self.take(3)?;
        Some(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    fn skip_u8_prefixed(&mut self) -> Option<()> {
        let n = self.u8()? as usize;
        self.take(n).map(|_| ())
    }

    fn skip_u16_prefixed(&mut self) -> Option<()> {
        let n = self.u16()? as usize;
        self.take(n).map(|_| ())
    }
}

// ── DNS ──────────────────────────────────────────────────────────────────────

/// What the first question of a DNS message says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    pub is_response: bool,
    /// First question as `(name, qtype)`, when the message carries one.
    pub question:    Option<(String, u16)>,
}

/// Parses the header and first question of a DNS message.
///
/// Returns `None` when the payload is too short to be DNS at all; a message
/// whose question is truncated still parses, with `question` left empty.
pub fn parse_dns(payload: &[u8]) -> Option<DnsMessage> {
    if payload.len() < 12 {
        return None;
    }
    let is_response = payload[2] & 0x80 != 0;
    let qdcount = u16::from_be_bytes([payload[4], payload[5]]);
    let question = if qdcount > 0 { parse_question(&payload[12..]) } else { None };
    Some(DnsMessage { is_response, question })
}

fn parse_question(buf: &[u8]) -> Option<(String, u16)> {
    let mut cur = Cursor::new(buf);
    let mut name = String::new();
    loop {
        let len = cur.u8()? as usize;
        if len == 0 {
            break;
        }
        // Compression pointers never appear in the first question.
        if len & 0xc0 != 0 {
            return None;
        }
        let label = std::str::from_utf8(cur.take(len)?).ok()?;
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(label);
        if name.len() > MAX_DNS_NAME {
            return None;
        }
    }
    let qtype = cur.u16()?;
    Some((name, qtype))
}

/// Mnemonic for common record types, the decimal code otherwise.
pub fn record_type_name(qtype: u16) -> String {
    let name = match qtype {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        12 => "PTR",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        64 => "SVCB",
        65 => "HTTPS",
        255 => "ANY",
        other => return other.to_string(),
    };
    name.to_string()
}

// ── TLS ──────────────────────────────────────────────────────────────────────

/// `true` when the payload starts with a TLS record header.
pub fn is_tls_record(payload: &[u8]) -> bool {
    payload.len() >= 3 && (0x14..=0x17).contains(&payload[0]) && payload[1] == 0x03
}

/// Extracts the `server_name` from a TLS ClientHello.
///
/// Walks the handshake structure field by field. A ClientHello split across
/// several TCP segments yields `None` for the first segment if the extension
/// block is not fully contained in it.
pub fn parse_tls_sni(payload: &[u8]) -> Option<String> {
    let mut rec = Cursor::new(payload);
    if rec.u8()? != 0x16 {
        return None;
    }
    rec.take(2)?; // record version
    let rec_len = rec.u16()? as usize;
    let body = &payload[5..];
    let body = &body[..rec_len.min(body.len())];

    let mut hs = Cursor::new(body);
    if hs.u8()? != 0x01 {
        return None;
    }
    hs.u24()?;
    hs.take(2 + 32)?; // client version, random
    hs.skip_u8_prefixed()?; // session id
    hs.skip_u16_prefixed()?; // cipher suites
    hs.skip_u8_prefixed()?; // compression methods

    let ext_len = hs.u16()? as usize;
    let mut ext = Cursor::new(hs.take(ext_len)?);
    while let Some(kind) = ext.u16() {
        let len = ext.u16()? as usize;
        let data = ext.take(len)?;
        if kind != 0x0000 {
            continue;
        }
        let mut list = Cursor::new(data);
        list.u16()?;
        while let Some(name_type) = list.u8() {
            let len = list.u16()? as usize;
            let name = list.take(len)?;
            if name_type == 0 {
                return std::str::from_utf8(name).ok().map(str::to_string);
            }
        }
        return None;
    }
    None
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

/// `true` when the payload starts with an HTTP/1.x status line.
pub fn is_http_response(payload: &[u8]) -> bool {
    payload.starts_with(b"HTTP/1.")
}

/// Parses the request line and the `Host`, `User-Agent` and `Authorization`
/// headers of an HTTP/1.x request. Header values other than those are ignored,
/// and only the presence of `Authorization` is kept.
pub fn parse_http_request(payload: &[u8]) -> Option<HttpRequest> {
    let first_space = payload.iter().position(|&b| b == b' ')?;
    let method = std::str::from_utf8(&payload[..first_space]).ok()?;
    if !HTTP_METHODS.contains(&method) {
        return None;
    }

    let head_end = find(payload, b"\r\n\r\n").unwrap_or(payload.len());
    let head = String::from_utf8_lossy(&payload[..head_end]);
    let mut lines = head.lines();

    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let uri = parts.next()?.to_string();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }

    let mut req = HttpRequest { method, uri, ..HttpRequest::default() };
    for line in lines {
        let Some((name, value)) = line.split_once(':') else { continue };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("host") {
            req.host = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("user-agent") {
            req.user_agent = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("authorization") {
            req.has_authorization = true;
        }
    }
    Some(req)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── ARP ──────────────────────────────────────────────────────────────────────

/// Sender protocol address of an Ethernet/IPv4 ARP packet.
///
/// Address-conflict checks announce `0.0.0.0` as the sender. That is not an
/// address the sender holds, so it yields `None`.
pub fn parse_arp_sender(payload: &[u8]) -> Option<Ipv4Addr> {
    let arp = ArpPacket::new(payload)?;
    if arp.get_hardware_type() != ArpHardwareTypes::Ethernet
        || arp.get_protocol_type() != EtherTypes::Ipv4
        || arp.get_hw_addr_len() != 6
        || arp.get_proto_addr_len() != 4
    {
        return None;
    }
    let sender = arp.get_sender_proto_addr();
    (!sender.is_unspecified()).then_some(sender)
}
