//! Echo capture engine and the hardware seams it drives.
//!
//! The capture sequence follows the HC-SR04 family: wait for the echo line
//! to go quiet, hold a short settle window, fire the trigger, then time the
//! width of the echo pulse. Every wait is a polling loop bounded by both a
//! deadline and a hard iteration cap, so an absent or wedged transducer
//! costs a bounded number of iterations instead of a stalled node. Nothing
//! in this path allocates or formats text.

pub mod presence;
pub mod smoothing;
pub mod validity;

/// Width of the trigger pulse implementations are expected to emit.
pub const TRIGGER_PULSE_MICROS: u64 = 10;

/// Drives the ultrasonic trigger line for one fixed-width pulse.
///
/// Implementations must be callable from both the measurement path and the
/// remote-command handler, must not allocate, and must not block beyond the
/// pulse width itself. Firing with no transducer attached is a no-op.
pub trait PulseDriver {
    /// Emits a single trigger pulse of [`TRIGGER_PULSE_MICROS`].
    fn fire(&mut self);
}

/// Samples the echo input line.
pub trait EchoInput {
    /// Returns `true` while the echo line reads high.
    fn echo_is_high(&mut self) -> bool;
}

/// Monotonic microsecond clock.
pub trait MicrosClock {
    /// Microseconds since an arbitrary epoch; never moves backwards.
    fn now_micros(&mut self) -> u64;
}

/// Tuning for one capture pass. All times in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Budget for waiting out an in-flight echo before triggering.
    pub clear_timeout_micros: u64,
    /// Quiet interval between the line clearing and the trigger pulse.
    pub settle_micros: u64,
    /// Longest flight time the capture waits for after firing.
    pub echo_timeout_micros: u64,
    /// Hard cap on iterations for each polling loop.
    pub max_poll_iterations: u32,
}

impl CaptureConfig {
    /// Reference tuning for the stock transducer.
    pub const DEFAULT: Self = Self {
        clear_timeout_micros: 5_000,
        settle_micros: 2_000,
        echo_timeout_micros: 25_000,
        max_poll_iterations: 100_000,
    };
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Result of one capture pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Echo pulse observed; width in microseconds.
    Echo(u64),
    /// No usable echo within the configured bounds.
    Timeout,
}

impl CaptureOutcome {
    #[must_use]
    pub const fn is_timeout(self) -> bool {
        matches!(self, CaptureOutcome::Timeout)
    }

    /// Measured width, if an echo was observed.
    #[must_use]
    pub const fn micros(self) -> Option<u64> {
        match self {
            CaptureOutcome::Echo(micros) => Some(micros),
            CaptureOutcome::Timeout => None,
        }
    }
}

/// Times the flight of a single ultrasonic pulse.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoTimer {
    config: CaptureConfig,
}

impl EchoTimer {
    #[must_use]
    pub const fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Runs one trigger/echo pass against the probe.
    ///
    /// The probe bundles the three hardware seams so one mutable borrow
    /// covers the whole pass. Any bound that trips yields
    /// [`CaptureOutcome::Timeout`]; the trigger is never fired while the
    /// echo line is still busy.
    pub fn capture<P>(&self, probe: &mut P) -> CaptureOutcome
    where
        P: PulseDriver + EchoInput + MicrosClock,
    {
        let start = probe.now_micros();
        let clear_deadline = start.saturating_add(self.config.clear_timeout_micros);
        if !self.poll_level(probe, false, clear_deadline) {
            return CaptureOutcome::Timeout;
        }

        let settle_deadline = probe.now_micros().saturating_add(self.config.settle_micros);
        if !self.wait_deadline(probe, settle_deadline) {
            return CaptureOutcome::Timeout;
        }

        probe.fire();

        let fired_at = probe.now_micros();
        let echo_deadline = fired_at.saturating_add(self.config.echo_timeout_micros);
        if !self.poll_level(probe, true, echo_deadline) {
            return CaptureOutcome::Timeout;
        }
        let rose_at = probe.now_micros();
        if !self.poll_level(probe, false, echo_deadline) {
            return CaptureOutcome::Timeout;
        }
        let fell_at = probe.now_micros();

        CaptureOutcome::Echo(fell_at.saturating_sub(rose_at))
    }

    /// Polls until the echo line reads `level`. False once the deadline
    /// passes or the iteration cap trips.
    fn poll_level<P>(&self, probe: &mut P, level: bool, deadline_micros: u64) -> bool
    where
        P: EchoInput + MicrosClock,
    {
        for _ in 0..self.config.max_poll_iterations {
            if probe.echo_is_high() == level {
                return true;
            }
            if probe.now_micros() >= deadline_micros {
                return false;
            }
        }
        false
    }

    /// Spins until the clock reaches the deadline, iteration-capped so a
    /// frozen clock cannot trap the capture.
    fn wait_deadline<P>(&self, probe: &mut P, deadline_micros: u64) -> bool
    where
        P: MicrosClock,
    {
        for _ in 0..self.config.max_poll_iterations {
            if probe.now_micros() >= deadline_micros {
                return true;
            }
        }
        false
    }
}
