//! HC-SR04 style transducer wiring.
//!
//! The measurement cycle drives one composite probe; emitter builds reuse
//! [`TriggerPin`] alone for remote-commanded pulses and receiver builds
//! sample [`EchoPin`] alone for presence.

use embassy_stm32::gpio::{Input, Output};
use embassy_time::{Duration, Instant, block_for};
use ranging_core::ranging::{EchoInput, MicrosClock, PulseDriver, TRIGGER_PULSE_MICROS};

/// Drives the trigger line for one fixed-width pulse.
pub struct TriggerPin<'d> {
    output: Output<'d>,
}

impl<'d> TriggerPin<'d> {
    pub fn new(output: Output<'d>) -> Self {
        Self { output }
    }
}

impl PulseDriver for TriggerPin<'_> {
    fn fire(&mut self) {
        self.output.set_high();
        block_for(Duration::from_micros(TRIGGER_PULSE_MICROS));
        self.output.set_low();
    }
}

/// Samples the echo line.
pub struct EchoPin<'d> {
    input: Input<'d>,
}

impl<'d> EchoPin<'d> {
    pub fn new(input: Input<'d>) -> Self {
        Self { input }
    }
}

impl EchoInput for EchoPin<'_> {
    fn echo_is_high(&mut self) -> bool {
        self.input.is_high()
    }
}

/// Monotonic microsecond clock over the Embassy timebase.
pub struct BootClock;

impl MicrosClock for BootClock {
    fn now_micros(&mut self) -> u64 {
        Instant::now().as_micros()
    }
}

/// Complete probe for the measurement cycle: trigger, echo, and clock.
pub struct SonarProbe<'d> {
    trigger: TriggerPin<'d>,
    echo: EchoPin<'d>,
    clock: BootClock,
}

impl<'d> SonarProbe<'d> {
    pub fn new(trigger: TriggerPin<'d>, echo: EchoPin<'d>) -> Self {
        Self {
            trigger,
            echo,
            clock: BootClock,
        }
    }
}

impl PulseDriver for SonarProbe<'_> {
    fn fire(&mut self) {
        self.trigger.fire();
    }
}

impl EchoInput for SonarProbe<'_> {
    fn echo_is_high(&mut self) -> bool {
        self.echo.echo_is_high()
    }
}

impl MicrosClock for SonarProbe<'_> {
    fn now_micros(&mut self) -> u64 {
        self.clock.now_micros()
    }
}
