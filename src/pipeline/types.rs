use pnet::util::MacAddr;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

/// Capture timestamp with microsecond precision, counted from the Unix epoch.
///
/// Kept as an integer so ordering, bucketing and rendering are exact and
/// repeated runs render byte-identical output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Builds a timestamp from the `timeval` pair stored in a pcap record header.
    pub const fn from_timeval(secs: i64, micros: i64) -> Self {
        Self::from_micros(secs * 1_000_000 + micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Floors the timestamp to a multiple of `width_secs`, returning whole seconds.
    pub fn floor_to(self, width_secs: i64) -> i64 {
        self.0.div_euclid(width_secs * 1_000_000) * width_secs
    }
}

#[cfg(test)]
impl Timestamp {
    pub(crate) const fn from_secs(secs: i64) -> Self {
        Self::from_micros(secs * 1_000_000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0.div_euclid(1_000_000),
            self.0.rem_euclid(1_000_000)
        )
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

// ── Decoded input ────────────────────────────────────────────────────────────

/// The question section of a DNS query as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    pub name:        String,
    /// Mnemonic record type (`A`, `AAAA`, `HTTPS`, ...) or the decimal code.
    pub record_type: String,
}

/// Hostname offered in the `server_name` extension of a TLS ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHello {
    pub server_name: String,
}

/// Head of a plaintext HTTP/1.x request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpRequest {
    pub method:            String,
    pub uri:               String,
    pub host:              Option<String>,
    pub user_agent:        Option<String>,
    /// Whether an `Authorization` header was present. The value itself is never kept.
    pub has_authorization: bool,
}

/// One decoded packet, as produced by the capture layer.
///
/// Every protocol-specific field is optional and only present when the
/// decoder recognised that protocol in the frame. Absence is never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSummary {
    pub timestamp:    Timestamp,
    pub src_mac:      Option<MacAddr>,
    pub dst_mac:      Option<MacAddr>,
    pub src_ip:       Option<IpAddr>,
    pub dst_ip:       Option<IpAddr>,
    /// Highest layer the decoder recognised (`DNS`, `TLS`, `TCP`, ...).
    pub protocol:     String,
    pub name_query:   Option<NameQuery>,
    pub tls_hello:    Option<TlsHello>,
    pub http_request: Option<HttpRequest>,
}

impl PacketSummary {
    /// Creates a summary carrying only a timestamp and protocol label.
    pub fn new(timestamp: Timestamp, protocol: impl Into<String>) -> Self {
        Self {
            timestamp,
            src_mac: None,
            dst_mac: None,
            src_ip: None,
            dst_ip: None,
            protocol: protocol.into(),
            name_query: None,
            tls_hello: None,
            http_request: None,
        }
    }
}

// ── Category events ──────────────────────────────────────────────────────────

/// A DNS query observed from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQueryEvent {
    pub timestamp:   Timestamp,
    pub client:      Option<IpAddr>,
    pub query:       String,
    pub record_type: String,
}

/// A hostname announced in a TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeHostnameEvent {
    pub timestamp: Timestamp,
    pub src:       Option<IpAddr>,
    pub dst:       Option<IpAddr>,
    pub hostname:  String,
}

/// A plaintext HTTP request line plus the headers an observer cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextRequestEvent {
    pub timestamp:         Timestamp,
    pub src:               Option<IpAddr>,
    /// Lower-cased `Host` header, empty when the request carried none.
    pub host:              String,
    pub method:            String,
    pub uri:               String,
    pub user_agent:        String,
    pub has_authorization: bool,
}
