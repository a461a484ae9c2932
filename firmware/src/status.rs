#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics carry cycle totals, link counters, the latest
//! estimate, and the presence flag between tasks so the shell can render a
//! `StatusSnapshot` without reaching into task-owned state. Every field has
//! a single writing task; readers tolerate tearing across fields.

use core::time::Duration;

use embassy_time::Instant;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, Ordering};
use ranging_core::cycle::CycleStats;
use ranging_core::link::{LinkState, LinkStats};
use ranging_core::node::NodeId;
use ranging_core::shell::status::{StatusProvider, StatusSnapshot};

use crate::role;

const LINK_STATE_DISCONNECTED: u8 = 0;
const LINK_STATE_CONNECTING: u8 = 1;
const LINK_STATE_CONNECTED: u8 = 2;

const PRESENCE_UNKNOWN: u8 = 0;
const PRESENCE_ABSENT: u8 = 1;
const PRESENCE_PRESENT: u8 = 2;

/// Identity adopted at boot or through `change_id`.
static NODE_ID: AtomicU16 = AtomicU16::new(0);

/// Cycle counters mirrored from the measurement task.
static CYCLES_TRIGGERED: AtomicU32 = AtomicU32::new(0);
static CYCLES_ACCEPTED: AtomicU32 = AtomicU32::new(0);
static CYCLES_REJECTED: AtomicU32 = AtomicU32::new(0);
static CYCLES_PUBLISHED: AtomicU32 = AtomicU32::new(0);
static CYCLES_DROPPED: AtomicU32 = AtomicU32::new(0);
static TRIGGERS_IGNORED: AtomicU32 = AtomicU32::new(0);

/// Link state and counters mirrored from the link task.
static LINK_STATE: AtomicU8 = AtomicU8::new(LINK_STATE_DISCONNECTED);
static LINK_ATTEMPTS: AtomicU32 = AtomicU32::new(0);
static LINK_CONNECTS: AtomicU32 = AtomicU32::new(0);
static LINK_FAILURES: AtomicU32 = AtomicU32::new(0);
static LINK_PUBLISHED: AtomicU32 = AtomicU32::new(0);
static LINK_DROPPED: AtomicU32 = AtomicU32::new(0);

/// Latest smoothed estimate as IEEE-754 bits; valid once the flag is set.
static ESTIMATE_BITS: AtomicU32 = AtomicU32::new(0);
static ESTIMATE_KNOWN: AtomicBool = AtomicBool::new(false);

/// Debounced presence flag, written by receiver builds only.
static PRESENCE: AtomicU8 = AtomicU8::new(PRESENCE_UNKNOWN);

const fn encode_link_state(state: LinkState) -> u8 {
    match state {
        LinkState::Disconnected => LINK_STATE_DISCONNECTED,
        LinkState::Connecting => LINK_STATE_CONNECTING,
        LinkState::Connected => LINK_STATE_CONNECTED,
    }
}

fn decode_link_state(raw: u8) -> LinkState {
    match raw {
        LINK_STATE_CONNECTING => LinkState::Connecting,
        LINK_STATE_CONNECTED => LinkState::Connected,
        _ => LinkState::Disconnected,
    }
}

const fn encode_presence(present: bool) -> u8 {
    if present { PRESENCE_PRESENT } else { PRESENCE_ABSENT }
}

fn decode_presence(raw: u8) -> Option<bool> {
    match raw {
        PRESENCE_ABSENT => Some(false),
        PRESENCE_PRESENT => Some(true),
        _ => None,
    }
}

fn estimate_micros() -> Option<f32> {
    if ESTIMATE_KNOWN.load(Ordering::Relaxed) {
        Some(f32::from_bits(ESTIMATE_BITS.load(Ordering::Relaxed)))
    } else {
        None
    }
}

/// Records the identity adopted at boot or changed by the operator.
pub fn record_identity(id: NodeId) {
    NODE_ID.store(id.value(), Ordering::Relaxed);
}

/// Mirrors the measurement task's running totals.
pub fn record_cycles(stats: &CycleStats) {
    CYCLES_TRIGGERED.store(stats.triggered, Ordering::Relaxed);
    CYCLES_ACCEPTED.store(stats.accepted, Ordering::Relaxed);
    CYCLES_REJECTED.store(stats.rejected, Ordering::Relaxed);
    CYCLES_PUBLISHED.store(stats.published, Ordering::Relaxed);
    CYCLES_DROPPED.store(stats.dropped, Ordering::Relaxed);
    TRIGGERS_IGNORED.store(stats.ignored_triggers, Ordering::Relaxed);
}

/// Mirrors the link task's state and counters.
pub fn record_link(state: LinkState, stats: &LinkStats) {
    LINK_STATE.store(encode_link_state(state), Ordering::Relaxed);
    LINK_ATTEMPTS.store(stats.attempts, Ordering::Relaxed);
    LINK_CONNECTS.store(stats.connects, Ordering::Relaxed);
    LINK_FAILURES.store(stats.failures, Ordering::Relaxed);
    LINK_PUBLISHED.store(stats.published, Ordering::Relaxed);
    LINK_DROPPED.store(stats.dropped, Ordering::Relaxed);
}

/// Stores the latest smoothed estimate.
pub fn record_estimate(estimate: f32) {
    ESTIMATE_BITS.store(estimate.to_bits(), Ordering::Relaxed);
    ESTIMATE_KNOWN.store(true, Ordering::Relaxed);
}

/// Stores the debounced presence flag.
pub fn record_presence(present: bool) {
    PRESENCE.store(encode_presence(present), Ordering::Relaxed);
}

/// Returns `true` while the link task reports `Connected`.
pub fn link_is_connected() -> bool {
    LINK_STATE.load(Ordering::Relaxed) == LINK_STATE_CONNECTED
}

/// Builds a [`StatusSnapshot`] from the stored metrics.
pub fn snapshot(uptime: Option<Duration>) -> StatusSnapshot {
    StatusSnapshot {
        id: NodeId::new(NODE_ID.load(Ordering::Relaxed)),
        role: role::ROLE,
        link: decode_link_state(LINK_STATE.load(Ordering::Relaxed)),
        cycles: CycleStats {
            triggered: CYCLES_TRIGGERED.load(Ordering::Relaxed),
            accepted: CYCLES_ACCEPTED.load(Ordering::Relaxed),
            rejected: CYCLES_REJECTED.load(Ordering::Relaxed),
            published: CYCLES_PUBLISHED.load(Ordering::Relaxed),
            dropped: CYCLES_DROPPED.load(Ordering::Relaxed),
            ignored_triggers: TRIGGERS_IGNORED.load(Ordering::Relaxed),
        },
        link_stats: LinkStats {
            attempts: LINK_ATTEMPTS.load(Ordering::Relaxed),
            connects: LINK_CONNECTS.load(Ordering::Relaxed),
            failures: LINK_FAILURES.load(Ordering::Relaxed),
            published: LINK_PUBLISHED.load(Ordering::Relaxed),
            dropped: LINK_DROPPED.load(Ordering::Relaxed),
        },
        estimate_micros: estimate_micros(),
        present: decode_presence(PRESENCE.load(Ordering::Relaxed)),
        uptime,
    }
}

/// Renders the shared atomics for the shell's `status` command.
pub struct FirmwareStatusProvider;

impl StatusProvider<Instant> for FirmwareStatusProvider {
    fn snapshot(&mut self, now: Instant) -> Option<StatusSnapshot> {
        Some(snapshot(Some(Duration::from_micros(now.as_micros()))))
    }
}
