//! Measurement cycle state machine.
//!
//! One cycle runs trigger → capture → validate → smooth → publish-or-drop
//! as a single bounded pass. The phase enum keeps transitions auditable:
//! every move goes through [`CyclePhase::try_advance`] so an illegal move
//! surfaces as a [`TransitionError`] instead of silent state corruption.
//! A sync edge that lands while a cycle is active is ignored, never queued;
//! the busy guard counts it and the next edge starts the next cycle.

use crate::ranging::smoothing::DistanceSmoother;
use crate::ranging::validity::PlausibilityWindow;
use crate::ranging::{CaptureConfig, CaptureOutcome, EchoInput, EchoTimer, MicrosClock, PulseDriver};

/// Upper bound on one full cycle, trigger to publish-or-drop.
///
/// The worst-case capture pass (full clear wait, settle, full echo wait)
/// fits inside this with room for the publish hand-off.
pub const CYCLE_ENVELOPE_MICROS: u64 = 35_000;

/// Phases of one measurement cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Triggered,
    Capturing,
    Accepted,
    Rejected,
    Published,
}

impl CyclePhase {
    /// Whether a new cycle may start from this phase.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, CyclePhase::Idle)
    }

    /// Validates a phase move.
    pub const fn try_advance(self, next: Self) -> Result<Self, TransitionError> {
        let legal = matches!(
            (self, next),
            (CyclePhase::Idle, CyclePhase::Triggered)
                | (CyclePhase::Triggered, CyclePhase::Capturing)
                | (CyclePhase::Capturing, CyclePhase::Accepted)
                | (CyclePhase::Capturing, CyclePhase::Rejected)
                | (CyclePhase::Accepted, CyclePhase::Published)
                | (CyclePhase::Accepted, CyclePhase::Idle)
                | (CyclePhase::Rejected, CyclePhase::Idle)
                | (CyclePhase::Published, CyclePhase::Idle)
        );
        if legal {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// Rejected phase move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionError {
    pub from: CyclePhase,
    pub to: CyclePhase,
}

/// Why a sample never reached the smoother.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// No echo within the capture bounds.
    EchoTimeout,
    /// Echo observed but outside the plausibility window.
    Implausible,
}

/// Terminal result of one cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CycleOutcome {
    /// Sample accepted and the estimate handed to the link.
    Published { raw_micros: u64, estimate: f32 },
    /// Sample accepted but the link was down; nothing queued.
    Dropped { raw_micros: u64, estimate: f32 },
    /// Sample rejected; filter state untouched.
    Rejected(RejectReason),
}

/// Failure to run a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleError {
    /// A cycle is already in flight; the trigger was ignored.
    Busy,
    /// Internal phase bookkeeping refused a move.
    Phase(TransitionError),
}

impl From<TransitionError> for CycleError {
    fn from(error: TransitionError) -> Self {
        CycleError::Phase(error)
    }
}

/// Running totals for one node's cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub triggered: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub published: u32,
    pub dropped: u32,
    /// Triggers refused because a cycle was still in flight.
    pub ignored_triggers: u32,
}

/// Sequences one ranging pass and owns the filter state it feeds.
#[derive(Debug)]
pub struct MeasurementCycle {
    phase: CyclePhase,
    timer: EchoTimer,
    window: PlausibilityWindow,
    smoother: DistanceSmoother,
    stats: CycleStats,
}

impl MeasurementCycle {
    #[must_use]
    pub fn new(
        capture: CaptureConfig,
        window: PlausibilityWindow,
        smoother: DistanceSmoother,
    ) -> Self {
        Self {
            phase: CyclePhase::Idle,
            timer: EchoTimer::new(capture),
            window,
            smoother,
            stats: CycleStats::default(),
        }
    }

    /// Runs one full cycle against the probe.
    ///
    /// `link_up` gates the publish step only; the smoother folds in every
    /// accepted sample either way so ranging keeps working offline.
    pub fn run<P>(&mut self, probe: &mut P, link_up: bool) -> Result<CycleOutcome, CycleError>
    where
        P: PulseDriver + EchoInput + MicrosClock,
    {
        if !self.phase.is_idle() {
            self.stats.ignored_triggers = self.stats.ignored_triggers.saturating_add(1);
            return Err(CycleError::Busy);
        }

        self.stats.triggered = self.stats.triggered.saturating_add(1);
        self.advance(CyclePhase::Triggered)?;
        self.advance(CyclePhase::Capturing)?;

        let outcome = match self.timer.capture(probe) {
            CaptureOutcome::Timeout => {
                self.advance(CyclePhase::Rejected)?;
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                CycleOutcome::Rejected(RejectReason::EchoTimeout)
            }
            CaptureOutcome::Echo(raw_micros) if !self.window.is_valid(raw_micros) => {
                self.advance(CyclePhase::Rejected)?;
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                CycleOutcome::Rejected(RejectReason::Implausible)
            }
            CaptureOutcome::Echo(raw_micros) => {
                self.advance(CyclePhase::Accepted)?;
                self.stats.accepted = self.stats.accepted.saturating_add(1);
                #[allow(clippy::cast_precision_loss)]
                let estimate = self.smoother.update(raw_micros as f32);

                if link_up {
                    self.advance(CyclePhase::Published)?;
                    self.stats.published = self.stats.published.saturating_add(1);
                    CycleOutcome::Published {
                        raw_micros,
                        estimate,
                    }
                } else {
                    self.stats.dropped = self.stats.dropped.saturating_add(1);
                    CycleOutcome::Dropped {
                        raw_micros,
                        estimate,
                    }
                }
            }
        };

        self.advance(CyclePhase::Idle)?;
        Ok(outcome)
    }

    fn advance(&mut self, next: CyclePhase) -> Result<(), TransitionError> {
        self.phase = self.phase.try_advance(next)?;
        Ok(())
    }

    #[must_use]
    pub const fn phase(&self) -> CyclePhase {
        self.phase
    }

    #[must_use]
    pub const fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Current smoothed estimate in microseconds.
    #[must_use]
    pub const fn estimate(&self) -> f32 {
        self.smoother.estimate()
    }

    #[must_use]
    pub const fn smoother(&self) -> &DistanceSmoother {
        &self.smoother
    }

    #[must_use]
    pub const fn window(&self) -> &PlausibilityWindow {
        &self.window
    }

    #[cfg(test)]
    fn force_phase(&mut self, phase: CyclePhase) {
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SimProbe {
        now: u64,
        fired_at: Option<u64>,
        fires: u32,
        echo_lag: u64,
        echo_width: u64,
    }

    impl SimProbe {
        fn new(echo_lag: u64, echo_width: u64) -> Self {
            Self {
                now: 0,
                fired_at: None,
                fires: 0,
                echo_lag,
                echo_width,
            }
        }

        fn tick(&mut self) -> u64 {
            let now = self.now;
            self.now += 1;
            now
        }
    }

    impl PulseDriver for SimProbe {
        fn fire(&mut self) {
            self.fires += 1;
            self.fired_at = Some(self.now);
        }
    }

    impl EchoInput for SimProbe {
        fn echo_is_high(&mut self) -> bool {
            let now = self.tick();
            match self.fired_at {
                Some(fired) => {
                    let rise = fired + self.echo_lag;
                    now >= rise && now < rise + self.echo_width
                }
                None => false,
            }
        }
    }

    impl MicrosClock for SimProbe {
        fn now_micros(&mut self) -> u64 {
            self.tick()
        }
    }

    fn test_cycle() -> MeasurementCycle {
        MeasurementCycle::new(
            CaptureConfig {
                clear_timeout_micros: 200,
                settle_micros: 50,
                echo_timeout_micros: 25_000,
                max_poll_iterations: 100_000,
            },
            PlausibilityWindow::new(20, 20_000),
            DistanceSmoother::new(),
        )
    }

    #[test]
    fn valid_echo_with_link_up_publishes() {
        let mut cycle = test_cycle();
        let mut probe = SimProbe::new(100, 15_000);

        let outcome = cycle.run(&mut probe, true).expect("cycle should run");

        let mut reference = DistanceSmoother::new();
        let expected = reference.update(15_000.0);
        assert_eq!(
            outcome,
            CycleOutcome::Published {
                raw_micros: 15_000,
                estimate: expected,
            }
        );
        assert_eq!(cycle.phase(), CyclePhase::Idle);
        assert_eq!(cycle.stats().triggered, 1);
        assert_eq!(cycle.stats().accepted, 1);
        assert_eq!(cycle.stats().published, 1);
    }

    #[test]
    fn valid_echo_with_link_down_still_smooths_but_drops() {
        let mut cycle = test_cycle();
        let mut probe = SimProbe::new(100, 15_000);

        let outcome = cycle.run(&mut probe, false).expect("cycle should run");

        match outcome {
            CycleOutcome::Dropped { raw_micros, .. } => assert_eq!(raw_micros, 15_000),
            other => panic!("expected a dropped sample, got {other:?}"),
        }
        assert_eq!(cycle.stats().dropped, 1);
        assert_eq!(cycle.stats().published, 0);
        // The filter still moved.
        assert!(cycle.estimate() > 0.0);
    }

    #[test]
    fn timeout_rejects_without_touching_the_filter() {
        let mut cycle = test_cycle();
        let before = cycle.smoother().estimate().to_bits();
        let mut probe = SimProbe::new(1_000_000, 400);

        let outcome = cycle.run(&mut probe, true).expect("cycle should run");

        assert_eq!(outcome, CycleOutcome::Rejected(RejectReason::EchoTimeout));
        assert_eq!(cycle.smoother().estimate().to_bits(), before);
        assert_eq!(cycle.stats().rejected, 1);
        assert_eq!(cycle.phase(), CyclePhase::Idle);
    }

    #[test]
    fn implausible_echo_rejects_without_touching_the_filter() {
        let mut cycle = test_cycle();
        let before = cycle.smoother().estimate().to_bits();
        // 22 ms flight, above the 20 ms ceiling but below the capture timeout.
        let mut probe = SimProbe::new(100, 22_000);

        let outcome = cycle.run(&mut probe, true).expect("cycle should run");

        assert_eq!(outcome, CycleOutcome::Rejected(RejectReason::Implausible));
        assert_eq!(cycle.smoother().estimate().to_bits(), before);
    }

    #[test]
    fn accepted_plus_rejected_equals_triggered() {
        let mut cycle = test_cycle();

        for width in [15_000_u64, 30_000, 400, 10, 18_000] {
            let mut probe = SimProbe::new(100, width);
            let _ = cycle.run(&mut probe, true).expect("cycle should run");
        }

        let stats = cycle.stats();
        assert_eq!(stats.triggered, 5);
        assert_eq!(stats.accepted + stats.rejected, stats.triggered);
        // 15000, 400 and 18000 pass the window; 30000 outlives the capture
        // deadline and 10 falls under the plausibility floor.
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn busy_cycle_ignores_the_trigger() {
        let mut cycle = test_cycle();
        cycle.force_phase(CyclePhase::Capturing);
        let mut probe = SimProbe::new(100, 15_000);

        let result = cycle.run(&mut probe, true);

        assert_eq!(result, Err(CycleError::Busy));
        assert_eq!(cycle.stats().ignored_triggers, 1);
        assert_eq!(cycle.stats().triggered, 0);
        assert_eq!(probe.fires, 0);
    }

    #[test]
    fn illegal_phase_moves_are_rejected() {
        assert!(CyclePhase::Idle.try_advance(CyclePhase::Published).is_err());
        assert!(CyclePhase::Rejected
            .try_advance(CyclePhase::Published)
            .is_err());
        assert!(CyclePhase::Published
            .try_advance(CyclePhase::Triggered)
            .is_err());
        assert!(CyclePhase::Idle.try_advance(CyclePhase::Triggered).is_ok());
        assert!(CyclePhase::Accepted.try_advance(CyclePhase::Idle).is_ok());
    }

    #[test]
    fn default_capture_fits_the_cycle_envelope() {
        let capture = CaptureConfig::default();
        let worst_case = capture.clear_timeout_micros
            + capture.settle_micros
            + capture.echo_timeout_micros;
        assert!(worst_case < CYCLE_ENVELOPE_MICROS);
    }
}
