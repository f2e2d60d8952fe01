//! Category extractors: DNS queries, TLS handshake hostnames and plaintext
//! HTTP requests.
//!
//! Each extractor is a pure predicate over a [`PacketSummary`]. When the
//! relevant optional field is present and usable one immutable event comes
//! out; otherwise nothing does. Malformed input is never an error here.

use crate::pipeline::types::*;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Turns qualifying packet summaries into category events.
pub trait Extractor {
    type Event;

    /// Builds the event for `packet`, or `None` if the packet does not
    /// carry this category's metadata.
    fn extract(packet: &PacketSummary) -> Option<Self::Event>;

    /// Grouping key used for top-N ranking.
    fn key(event: &Self::Event) -> &str;
}

/// DNS name queries, grouped by queried domain.
pub struct NameQueries;

/// TLS ClientHello server names, grouped by hostname.
pub struct HandshakeHostnames;

/// Plaintext HTTP requests, grouped by requested host.
pub struct PlaintextRequests;

impl Extractor for NameQueries {
    type Event = NameQueryEvent;

    fn extract(packet: &PacketSummary) -> Option<NameQueryEvent> {
        let query = packet.name_query.as_ref()?;
        let name = normalize_name(&query.name)?;
        Some(NameQueryEvent {
            timestamp:   packet.timestamp,
            client:      packet.src_ip,
            query:       name,
            record_type: query.record_type.clone(),
        })
    }

    fn key(event: &NameQueryEvent) -> &str {
        &event.query
    }
}

impl Extractor for HandshakeHostnames {
    type Event = HandshakeHostnameEvent;

    fn extract(packet: &PacketSummary) -> Option<HandshakeHostnameEvent> {
        let hello = packet.tls_hello.as_ref()?;
        Some(HandshakeHostnameEvent {
            timestamp: packet.timestamp,
            src:       packet.src_ip,
            dst:       packet.dst_ip,
            hostname:  normalize_name(&hello.server_name)?,
        })
    }

    fn key(event: &HandshakeHostnameEvent) -> &str {
        &event.hostname
    }
}

impl Extractor for PlaintextRequests {
    type Event = PlaintextRequestEvent;

    fn extract(packet: &PacketSummary) -> Option<PlaintextRequestEvent> {
        let req = packet.http_request.as_ref()?;
        let method = req.method.trim();
        if method.is_empty() {
            return None;
        }
        Some(PlaintextRequestEvent {
            timestamp:         packet.timestamp,
            src:               packet.src_ip,
            host:              req.host.as_deref().map(|h| h.trim().to_lowercase()).unwrap_or_default(),
            method:            method.to_string(),
            uri:               req.uri.clone(),
            user_agent:        req.user_agent.clone().unwrap_or_default(),
            has_authorization: req.has_authorization,
        })
    }

    fn key(event: &PlaintextRequestEvent) -> &str {
        &event.host
    }
}

/// Lower-cases a DNS-style name and drops the root label. Empty names yield `None`.
fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_end_matches('.');
    (!name.is_empty()).then(|| name.to_lowercase())
}

/// Whether an appended event's key had been seen before in the same log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    First,
    Repeat,
}

/// Append-only, arrival-ordered event log for one category.
pub struct EventLog<X: Extractor> {
    events: Vec<X::Event>,
    seen:   HashSet<String>,
    _kind:  PhantomData<X>,
}

impl<X: Extractor> Default for EventLog<X> {
    fn default() -> Self {
        Self { events: Vec::new(), seen: HashSet::new(), _kind: PhantomData }
    }
}

impl<X: Extractor> EventLog<X> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the extractor over `packet` and appends the event it produces.
    pub fn observe(&mut self, packet: &PacketSummary) -> Option<Sighting> {
        let event = X::extract(packet)?;
        let sighting = if self.seen.insert(X::key(&event).to_string()) {
            Sighting::First
        } else {
            Sighting::Repeat
        };
        self.events.push(event);
        Some(sighting)
    }

    pub fn last(&self) -> Option<&X::Event> {
        self.events.last()
    }

    pub fn events(&self) -> &[X::Event] {
        &self.events
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(X::key)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends another log's events after this one's.
    pub fn merge(&mut self, other: EventLog<X>) {
        self.seen.extend(other.seen);
        self.events.extend(other.events);
    }
}
