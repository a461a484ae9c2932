//! Topic names, client identifiers and payload text for the telemetry
//! channel. Everything here is bounded `heapless` text so the link layer
//! can build frames without allocating.

use core::fmt::Write;

use heapless::String;
use winnow::Parser;
use winnow::ascii::dec_uint;
use winnow::error::ContextError;

use crate::node::NodeId;

pub const TOPIC_CAPACITY: usize = 32;
pub const PAYLOAD_CAPACITY: usize = 48;
pub const CLIENT_ID_CAPACITY: usize = 24;

pub type Topic = String<TOPIC_CAPACITY>;
pub type Payload = String<PAYLOAD_CAPACITY>;
pub type ClientId = String<CLIENT_ID_CAPACITY>;

/// Shared control topic every broadcast emitter hears.
pub const EMIT_TOPIC: &str = "ultrasound_emit";

/// Client identifier presented to the telemetry broker.
#[must_use]
pub fn client_id(id: NodeId) -> ClientId {
    let mut out = ClientId::new();
    write!(out, "BaseStation-{id}").expect("client id fits its buffer");
    out
}

/// Topic carrying this node's smoothed distance estimates.
#[must_use]
pub fn distance_topic(id: NodeId) -> Topic {
    let mut out = Topic::new();
    write!(out, "distances/{id}").expect("distance topic fits its buffer");
    out
}

/// Topic carrying this node's presence transitions.
#[must_use]
pub fn presence_topic(id: NodeId) -> Topic {
    let mut out = Topic::new();
    write!(out, "presence/{id}").expect("presence topic fits its buffer");
    out
}

/// Per-node control topic for targeted emit commands.
#[must_use]
pub fn command_topic(id: NodeId) -> Topic {
    let mut out = Topic::new();
    write!(out, "/base_stations/{id}").expect("command topic fits its buffer");
    out
}

/// Distance estimates travel as decimal text with two fractional digits.
#[must_use]
pub fn distance_payload(estimate: f32) -> Payload {
    let mut out = Payload::new();
    write!(out, "{estimate:.2}").expect("distance payload fits its buffer");
    out
}

/// Presence payload: `1` while present, `0` otherwise.
#[must_use]
pub const fn presence_payload(present: bool) -> &'static str {
    if present { "1" } else { "0" }
}

/// Parses a payload that must be exactly one decimal node identifier.
#[must_use]
pub fn parse_node_id(text: &str) -> Option<NodeId> {
    dec_uint::<_, u16, ContextError>
        .parse(text)
        .ok()
        .map(NodeId::new)
}
