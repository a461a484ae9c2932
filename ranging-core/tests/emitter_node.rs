//! Emitter and receiver roles driven over the broker link.

use ranging_core::control::{EmitControl, EmitDecision, IgnoreReason};
use ranging_core::link::{LinkConfig, LinkPort, LinkState, LinkSupervisor, PortEvent};
use ranging_core::node::{EmitMode, NodeId};
use ranging_core::ranging::presence::PresenceDetector;
use ranging_core::ranging::PulseDriver;
use ranging_core::wire::{self, ClientId};

#[derive(Default)]
struct RecordingPort {
    subscribed: Vec<String>,
    published: Vec<(String, String)>,
}

impl LinkPort for RecordingPort {
    type Error = ();

    fn open(&mut self, _client: &ClientId) -> Result<(), ()> {
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.subscribed.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), ()> {
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct CountingPulse {
    fires: u32,
}

impl PulseDriver for CountingPulse {
    fn fire(&mut self) {
        self.fires += 1;
    }
}

/// Feeds one transport event through the role glue the firmware runs.
fn route(
    event: PortEvent<'_>,
    now: u64,
    link: &mut LinkSupervisor,
    port: &mut RecordingPort,
    control: &mut EmitControl,
    pulse: &mut CountingPulse,
) -> Option<EmitDecision> {
    match event {
        PortEvent::Opened => {
            link.on_opened(now, port);
            None
        }
        PortEvent::Closed => {
            link.on_closed(now);
            None
        }
        PortEvent::Message { topic, payload } => {
            (topic == control.control_topic().as_str())
                .then(|| control.on_message(payload, pulse))
        }
    }
}

#[test]
fn broadcast_emitter_fires_on_the_shared_topic() {
    let id = NodeId::new(5);
    let mut control = EmitControl::new(id, EmitMode::Broadcast);
    let mut link = LinkSupervisor::new(wire::client_id(id), LinkConfig::DEFAULT);
    link.add_subscription(control.control_topic())
        .expect("room for the control topic");
    let mut port = RecordingPort::default();
    let mut pulse = CountingPulse::default();

    assert_eq!(link.service(0, &mut port), LinkState::Connecting);
    route(
        PortEvent::Opened,
        100,
        &mut link,
        &mut port,
        &mut control,
        &mut pulse,
    );
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(port.subscribed, ["ultrasound_emit"]);

    let decision = route(
        PortEvent::Message {
            topic: "ultrasound_emit",
            payload: b"emit",
        },
        200,
        &mut link,
        &mut port,
        &mut control,
        &mut pulse,
    );
    assert_eq!(decision, Some(EmitDecision::Fired));
    assert_eq!(pulse.fires, 1);

    // Traffic on unrelated topics never reaches the pulse.
    let decision = route(
        PortEvent::Message {
            topic: "distances/2",
            payload: b"100.00",
        },
        300,
        &mut link,
        &mut port,
        &mut control,
        &mut pulse,
    );
    assert_eq!(decision, None);
    assert_eq!(pulse.fires, 1);
}

#[test]
fn targeted_emitter_answers_only_its_own_address() {
    let id = NodeId::new(7);
    let mut control = EmitControl::new(id, EmitMode::Targeted);
    let mut link = LinkSupervisor::new(wire::client_id(id), LinkConfig::DEFAULT);
    link.add_subscription(control.control_topic())
        .expect("room for the control topic");
    let mut port = RecordingPort::default();
    let mut pulse = CountingPulse::default();

    assert_eq!(link.service(0, &mut port), LinkState::Connecting);
    route(
        PortEvent::Opened,
        100,
        &mut link,
        &mut port,
        &mut control,
        &mut pulse,
    );
    assert_eq!(port.subscribed, ["/base_stations/7"]);

    let cases: [(&[u8], Option<EmitDecision>); 3] = [
        (b"7", Some(EmitDecision::Fired)),
        (b"8", Some(EmitDecision::Ignored(IgnoreReason::OtherTarget))),
        (b"zz", Some(EmitDecision::Ignored(IgnoreReason::Malformed))),
    ];
    for (payload, expected) in cases {
        let decision = route(
            PortEvent::Message {
                topic: "/base_stations/7",
                payload,
            },
            200,
            &mut link,
            &mut port,
            &mut control,
            &mut pulse,
        );
        assert_eq!(decision, expected);
    }

    assert_eq!(pulse.fires, 1);
    assert_eq!(control.stats().fired, 1);
    assert_eq!(control.stats().ignored, 2);
}

#[test]
fn receiver_publishes_presence_transitions_only() {
    let id = NodeId::new(11);
    let mut link = LinkSupervisor::new(wire::client_id(id), LinkConfig::DEFAULT);
    let mut port = RecordingPort::default();
    let mut detector: PresenceDetector<4> = PresenceDetector::new();

    assert_eq!(link.service(0, &mut port), LinkState::Connecting);
    assert_eq!(link.on_opened(100, &mut port), LinkState::Connected);

    // Steady detections announce once; steady silence announces once more.
    let mut now = 1_000;
    for detected in [true, true, true, false, false, false, false] {
        let update = detector.push(detected);
        if update.transition.is_some() {
            link.publish(
                now,
                &mut port,
                &wire::presence_topic(id),
                wire::presence_payload(update.present),
            )
            .expect("publish while connected");
        }
        now += 1_000;
    }

    let messages: Vec<(&str, &str)> = port
        .published
        .iter()
        .map(|(topic, payload)| (topic.as_str(), payload.as_str()))
        .collect();
    assert_eq!(
        messages,
        [("presence/11", "1"), ("presence/11", "0")],
        "only the two transitions go out"
    );
}
