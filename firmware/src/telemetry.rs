#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Event-log glue for the firmware target.
//!
//! `ranging-core`'s recorder is generic over its instant type; firmware pins
//! it to the Embassy monotonic clock. The ring is diagnostic only, so each
//! task owns its own recorder and mirrors notable events to defmt as they
//! happen.

use core::time::Duration;

use embassy_time::Instant;
use ranging_core::telemetry::{EventInstant, EventRecorder};

/// Embassy-backed instant stored in event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeInstant(Instant);

impl NodeInstant {
    /// Returns the wrapped Embassy instant.
    #[must_use]
    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for NodeInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl EventInstant for NodeInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

/// Event log kept by each firmware task.
pub type NodeEventLog = EventRecorder<NodeInstant>;

#[cfg(test)]
mod tests {
    use super::*;
    use ranging_core::telemetry::NodeEventKind;

    fn at(micros: u64) -> NodeInstant {
        NodeInstant::from(Instant::from_micros(micros))
    }

    #[test]
    fn edge_spacing_comes_from_the_embassy_clock() {
        let mut log = NodeEventLog::new();
        log.record_sync_edge(at(1_000));
        log.record_sync_edge(at(51_000));

        let last = log.latest().expect("record kept");
        assert_eq!(
            last.kind,
            NodeEventKind::SyncEdge {
                since_last: Some(Duration::from_micros(50_000))
            }
        );
    }

    #[test]
    fn earlier_instants_saturate_to_zero() {
        assert_eq!(at(5).saturating_duration_since(at(500)), Duration::ZERO);
    }
}
