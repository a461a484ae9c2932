//! Shared status surface for the operator shell.
//!
//! The firmware and emulator implement [`StatusProvider`] so the shell can
//! surface live node state through the `status` command without duplicating
//! platform logic. [`StatusFormatter`] keeps the textual rendering
//! consistent across front-ends.

use core::fmt;
use core::time::Duration;

use crate::cycle::CycleStats;
use crate::link::{LinkState, LinkStats};
use crate::node::{NodeId, NodeRole};

/// Snapshot of reusable status information surfaced by the shell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub id: NodeId,
    pub role: NodeRole,
    pub link: LinkState,
    pub cycles: CycleStats,
    pub link_stats: LinkStats,
    /// Latest smoothed estimate, absent until a sample has been accepted.
    pub estimate_micros: Option<f32>,
    /// Debounced presence, reported by receiver nodes only.
    pub present: Option<bool>,
    pub uptime: Option<Duration>,
}

impl StatusSnapshot {
    /// Builds a snapshot with no activity recorded yet.
    #[must_use]
    pub const fn idle(id: NodeId, role: NodeRole) -> Self {
        Self {
            id,
            role,
            link: LinkState::Disconnected,
            cycles: CycleStats {
                triggered: 0,
                accepted: 0,
                rejected: 0,
                published: 0,
                dropped: 0,
                ignored_triggers: 0,
            },
            link_stats: LinkStats {
                attempts: 0,
                connects: 0,
                failures: 0,
                published: 0,
                dropped: 0,
            },
            estimate_micros: None,
            present: None,
            uptime: None,
        }
    }
}

/// Platform hook that supplies live status information.
pub trait StatusProvider<Instant> {
    /// Returns a snapshot if the platform can currently provide one.
    fn snapshot(&mut self, now: Instant) -> Option<StatusSnapshot>;
}

/// Placeholder status provider that never reports snapshots.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStatusProvider;

impl<Instant> StatusProvider<Instant> for NoStatusProvider {
    fn snapshot(&mut self, _now: Instant) -> Option<StatusSnapshot> {
        None
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the identity line (e.g. `node id=3 role=ranging uptime=+12.3s`).
    pub fn write_node_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "node id={} role={}",
            self.snapshot.id,
            self.snapshot.role.as_str()
        )?;
        writer.write_str(" uptime=")?;
        write_duration(writer, self.snapshot.uptime)
    }

    /// Writes the link line (e.g. `link state=connected connects=1 ...`).
    pub fn write_link_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("link state=")?;
        writer.write_str(match self.snapshot.link {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        })?;

        let stats = &self.snapshot.link_stats;
        write!(
            writer,
            " attempts={} connects={} failures={} published={} dropped={}",
            stats.attempts, stats.connects, stats.failures, stats.published, stats.dropped
        )
    }

    /// Writes the measurement line (e.g. `cycles triggered=10 ... estimate=14987.55us`).
    pub fn write_cycle_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let stats = &self.snapshot.cycles;
        write!(
            writer,
            "cycles triggered={} accepted={} rejected={} published={} dropped={} ignored={}",
            stats.triggered,
            stats.accepted,
            stats.rejected,
            stats.published,
            stats.dropped,
            stats.ignored_triggers
        )?;

        writer.write_str(" estimate=")?;
        match self.snapshot.estimate_micros {
            Some(estimate) => write!(writer, "{estimate:.2}us"),
            None => writer.write_str("n/a"),
        }
    }

    /// Writes the presence line (e.g. `presence detected=yes`).
    pub fn write_presence_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("presence detected=")?;
        writer.write_str(match self.snapshot.present {
            Some(true) => "yes",
            Some(false) => "no",
            None => "n/a",
        })
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) if value >= Duration::from_millis(1) => {
            write!(writer, "+{}ms", value.as_millis())
        }
        Some(value) => write!(writer, "+{}us", value.as_micros()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn sample_snapshot() -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::idle(NodeId::new(3), NodeRole::Ranging);
        snapshot.link = LinkState::Connected;
        snapshot.cycles.triggered = 10;
        snapshot.cycles.accepted = 9;
        snapshot.cycles.rejected = 1;
        snapshot.cycles.published = 9;
        snapshot.link_stats.attempts = 2;
        snapshot.link_stats.connects = 1;
        snapshot.link_stats.failures = 1;
        snapshot.link_stats.published = 9;
        snapshot.estimate_micros = Some(14_987.5);
        snapshot.uptime = Some(Duration::from_millis(12_300));
        snapshot
    }

    #[test]
    fn node_line_reports_identity_and_uptime() {
        let snapshot = sample_snapshot();
        let mut out: String<64> = String::new();
        StatusFormatter::new(&snapshot)
            .write_node_line(&mut out)
            .expect("line fits");
        assert_eq!(out.as_str(), "node id=3 role=ranging uptime=+12.3s");
    }

    #[test]
    fn link_line_reports_state_and_counters() {
        let snapshot = sample_snapshot();
        let mut out: String<96> = String::new();
        StatusFormatter::new(&snapshot)
            .write_link_line(&mut out)
            .expect("line fits");
        assert_eq!(
            out.as_str(),
            "link state=connected attempts=2 connects=1 failures=1 published=9 dropped=0"
        );
    }

    #[test]
    fn cycle_line_reports_counters_and_estimate() {
        let snapshot = sample_snapshot();
        let mut out: String<128> = String::new();
        StatusFormatter::new(&snapshot)
            .write_cycle_line(&mut out)
            .expect("line fits");
        assert_eq!(
            out.as_str(),
            "cycles triggered=10 accepted=9 rejected=1 published=9 dropped=0 ignored=0 \
             estimate=14987.50us"
        );
    }

    #[test]
    fn idle_snapshot_renders_placeholders() {
        let snapshot = StatusSnapshot::idle(NodeId::new(0), NodeRole::Receiver);
        let mut out: String<128> = String::new();
        let formatter = StatusFormatter::new(&snapshot);

        formatter.write_node_line(&mut out).expect("line fits");
        assert_eq!(out.as_str(), "node id=0 role=receiver uptime=n/a");

        out.clear();
        formatter.write_cycle_line(&mut out).expect("line fits");
        assert!(out.as_str().ends_with("estimate=n/a"));

        out.clear();
        formatter.write_presence_line(&mut out).expect("line fits");
        assert_eq!(out.as_str(), "presence detected=n/a");
    }

    #[test]
    fn presence_line_reports_the_flag() {
        let mut snapshot = StatusSnapshot::idle(NodeId::new(1), NodeRole::Receiver);
        snapshot.present = Some(true);
        let mut out: String<64> = String::new();
        StatusFormatter::new(&snapshot)
            .write_presence_line(&mut out)
            .expect("line fits");
        assert_eq!(out.as_str(), "presence detected=yes");
    }
}
