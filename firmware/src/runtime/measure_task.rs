use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_time::{Duration, Instant, Timer};

use ranging_core::cycle::{CycleOutcome, MeasurementCycle, RejectReason};
use ranging_core::node::{CycleTrigger, NodeConfig};
use ranging_core::ranging::smoothing::DistanceSmoother;
use ranging_core::wire;

use crate::hw::sonar::{EchoPin, SonarProbe, TriggerPin};
use crate::link::{Publication, PublishQueue};
use crate::status;
use crate::telemetry::{NodeEventLog, NodeInstant};

#[embassy_executor::task]
pub async fn run(
    trigger_pin: Peri<'static, hal::peripherals::PA4>,
    echo_pin: Peri<'static, hal::peripherals::PA5>,
    sync_pin: Peri<'static, hal::peripherals::PA6>,
    sync_channel: Peri<'static, hal::peripherals::EXTI6>,
    node: NodeConfig,
    publications: &'static PublishQueue,
) -> ! {
    let mut probe = SonarProbe::new(
        TriggerPin::new(Output::new(trigger_pin, Level::Low, Speed::Low)),
        EchoPin::new(Input::new(echo_pin, Pull::Down)),
    );
    let mut sync = ExtiInput::new(sync_pin, sync_channel, Pull::Up);

    let mut cycle = MeasurementCycle::new(node.capture, node.window, DistanceSmoother::new());
    let mut events = NodeEventLog::new();
    let publications = publications.sender();

    loop {
        match node.trigger {
            CycleTrigger::SyncEdge => sync.wait_for_falling_edge().await,
            CycleTrigger::Periodic { period_micros } => {
                Timer::after(Duration::from_micros(period_micros)).await;
            }
        }

        let now = NodeInstant::from(Instant::now());
        events.record_sync_edge(now);

        match cycle.run(&mut probe, status::link_is_connected()) {
            Ok(outcome) => {
                events.record_cycle_outcome(&outcome, now);
                status::record_cycles(cycle.stats());
                match outcome {
                    CycleOutcome::Published {
                        raw_micros,
                        estimate,
                    } => {
                        status::record_estimate(estimate);
                        defmt::info!("cycle: echo {}us, estimate {}us", raw_micros, estimate);

                        let publication = Publication {
                            topic: wire::distance_topic(node.id),
                            payload: wire::distance_payload(estimate),
                        };
                        if publications.try_send(publication).is_err() {
                            defmt::warn!("cycle: publish queue full, sample dropped");
                        }
                    }
                    CycleOutcome::Dropped { estimate, .. } => {
                        status::record_estimate(estimate);
                        defmt::debug!("cycle: link down, estimate {}us kept locally", estimate);
                    }
                    CycleOutcome::Rejected(reason) => {
                        defmt::debug!("cycle: sample rejected ({})", reject_label(reason));
                    }
                }
            }
            Err(_) => {
                status::record_cycles(cycle.stats());
                defmt::warn!("cycle: trigger ignored, capture already in flight");
            }
        }
    }
}

const fn reject_label(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::EchoTimeout => "echo timeout",
        RejectReason::Implausible => "implausible",
    }
}
