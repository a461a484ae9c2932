use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::gpio::{Input, Pull};
use embassy_time::{Duration, Instant, Ticker};

use ranging_core::node::NodeConfig;
use ranging_core::ranging::EchoInput;
use ranging_core::ranging::presence::PresenceDetector;
use ranging_core::wire::{self, Payload};

use crate::hw::sonar::EchoPin;
use crate::link::{Publication, PublishQueue};
use crate::status;
use crate::telemetry::{NodeEventLog, NodeInstant};

#[embassy_executor::task]
pub async fn run(
    echo_pin: Peri<'static, hal::peripherals::PA5>,
    node: NodeConfig,
    publications: &'static PublishQueue,
) -> ! {
    let mut echo = EchoPin::new(Input::new(echo_pin, Pull::Down));
    let mut detector: PresenceDetector = PresenceDetector::new();
    let mut events = NodeEventLog::new();
    let mut ticker = Ticker::every(Duration::from_micros(node.presence_period_micros));
    let publications = publications.sender();

    loop {
        ticker.next().await;

        let update = detector.push(echo.echo_is_high());
        status::record_presence(update.present);
        if update.transition.is_none() {
            continue;
        }

        events.record_presence(&update, NodeInstant::from(Instant::now()));
        defmt::info!(
            "presence: {}",
            if update.present { "present" } else { "absent" }
        );

        let publication = Publication {
            topic: wire::presence_topic(node.id),
            payload: Payload::try_from(wire::presence_payload(update.present))
                .expect("presence payload fits its buffer"),
        };
        if publications.try_send(publication).is_err() {
            defmt::warn!("presence: publish queue full, transition dropped");
        }
    }
}
