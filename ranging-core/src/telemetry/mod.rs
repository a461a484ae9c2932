//! Node event log.
//!
//! Firmware and emulator tasks record what the node did (edges, captures,
//! link moves, emit decisions) into a fixed ring the shell's `status`
//! command can walk. The log is diagnostic only; nothing reads it back to
//! make decisions.

use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::control::{EmitDecision, IgnoreReason};
use crate::cycle::{CycleOutcome, RejectReason};
use crate::link::LinkState;
use crate::node::NodeId;
use crate::ranging::presence::{PresenceTransition, PresenceUpdate};

/// Identifier attached to recorded events, wrapping on overflow.
pub type EventId = u32;

/// Total number of events retained in memory.
pub const EVENT_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for event tracking.
pub trait EventInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Things a node does that are worth remembering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeEventKind {
    /// Synchronization edge, with the spacing to the previous one.
    SyncEdge { since_last: Option<Duration> },
    /// Edge arrived while a cycle was still in flight.
    TriggerIgnored,
    /// Capture accepted with its raw width.
    EchoAccepted { micros: u64 },
    /// Capture rejected before the filter.
    EchoRejected { reason: RejectReason },
    /// Estimate went out on the distance topic.
    EstimatePublished,
    /// Estimate dropped because the link was down.
    PublishDropped,
    LinkConnecting,
    LinkConnected,
    LinkLost,
    /// Debounced presence flipped.
    PresenceChanged { present: bool },
    /// Control payload fired the pulse.
    EmitFired,
    /// Control payload dismissed.
    EmitIgnored { reason: IgnoreReason },
    /// Operator persisted a new identity.
    IdChanged { id: NodeId },
}

/// Event record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub kind: NodeEventKind,
}

/// Event ring buffer type alias.
pub type EventRing<TInstant, const CAPACITY: usize = EVENT_RING_CAPACITY> =
    HistoryBuf<EventRecord<TInstant>, CAPACITY>;

/// Records node events into a fixed-size ring buffer.
pub struct EventRecorder<TInstant, const CAPACITY: usize = EVENT_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: EventRing<TInstant, CAPACITY>,
    last_edge_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> EventRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + EventInstant,
{
    /// Creates a new recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_edge_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded events in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, EventRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent record, if available.
    pub fn latest(&self) -> Option<&EventRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a synchronization edge and the spacing since the previous one.
    pub fn record_sync_edge(&mut self, timestamp: TInstant) -> EventId {
        let since_last = self
            .last_edge_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_edge_at = Some(timestamp);
        self.record(NodeEventKind::SyncEdge { since_last }, timestamp)
    }

    /// Records the terminal outcome of one measurement cycle.
    ///
    /// Accepted samples write two entries (the capture, then the publish
    /// result) so the ring reads like the cycle ran.
    pub fn record_cycle_outcome(
        &mut self,
        outcome: &CycleOutcome,
        timestamp: TInstant,
    ) -> EventId {
        match outcome {
            CycleOutcome::Published { raw_micros, .. } => {
                self.record(
                    NodeEventKind::EchoAccepted {
                        micros: *raw_micros,
                    },
                    timestamp,
                );
                self.record(NodeEventKind::EstimatePublished, timestamp)
            }
            CycleOutcome::Dropped { raw_micros, .. } => {
                self.record(
                    NodeEventKind::EchoAccepted {
                        micros: *raw_micros,
                    },
                    timestamp,
                );
                self.record(NodeEventKind::PublishDropped, timestamp)
            }
            CycleOutcome::Rejected(reason) => {
                self.record(NodeEventKind::EchoRejected { reason: *reason }, timestamp)
            }
        }
    }

    /// Records a link lifecycle move.
    pub fn record_link_state(&mut self, state: LinkState, timestamp: TInstant) -> EventId {
        let kind = match state {
            LinkState::Disconnected => NodeEventKind::LinkLost,
            LinkState::Connecting => NodeEventKind::LinkConnecting,
            LinkState::Connected => NodeEventKind::LinkConnected,
        };
        self.record(kind, timestamp)
    }

    /// Records a presence flip; steady presence writes nothing.
    pub fn record_presence(
        &mut self,
        update: &PresenceUpdate,
        timestamp: TInstant,
    ) -> Option<EventId> {
        update.transition.map(|transition| {
            let present = matches!(transition, PresenceTransition::Appeared);
            self.record(NodeEventKind::PresenceChanged { present }, timestamp)
        })
    }

    /// Records what a control payload did.
    pub fn record_emit(&mut self, decision: EmitDecision, timestamp: TInstant) -> EventId {
        let kind = match decision {
            EmitDecision::Fired => NodeEventKind::EmitFired,
            EmitDecision::Ignored(reason) => NodeEventKind::EmitIgnored { reason },
        };
        self.record(kind, timestamp)
    }

    /// Records a persisted identity change.
    pub fn record_id_changed(&mut self, id: NodeId, timestamp: TInstant) -> EventId {
        self.record(NodeEventKind::IdChanged { id }, timestamp)
    }

    /// Records an arbitrary event.
    pub fn record(&mut self, kind: NodeEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(EventRecord {
            id,
            timestamp,
            kind,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for EventRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + EventInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
