//! Broker outages: retry cadence, handshake timeouts and reconnect behavior.

use ranging_core::link::{LinkConfig, LinkPort, LinkState, LinkSupervisor, PublishError};
use ranging_core::node::NodeId;
use ranging_core::wire::{self, ClientId};

#[derive(Default)]
struct FlakyPort {
    opens: u32,
    subscribed: Vec<String>,
    published: Vec<(String, String)>,
    refuse_opens: u32,
    refuse_publish: bool,
}

impl LinkPort for FlakyPort {
    type Error = ();

    fn open(&mut self, _client: &ClientId) -> Result<(), ()> {
        self.opens += 1;
        if self.refuse_opens > 0 {
            self.refuse_opens -= 1;
            return Err(());
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.subscribed.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), ()> {
        if self.refuse_publish {
            return Err(());
        }
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

fn supervisor(id: u16) -> LinkSupervisor {
    LinkSupervisor::new(wire::client_id(NodeId::new(id)), LinkConfig::DEFAULT)
}

#[test]
fn refused_opens_retry_on_a_fixed_cadence() {
    let mut link = supervisor(9);
    let mut port = FlakyPort {
        refuse_opens: 3,
        ..FlakyPort::default()
    };

    assert_eq!(link.service(0, &mut port), LinkState::Disconnected);
    assert_eq!(port.opens, 1);

    // Between retries the supervisor stays quiet.
    assert_eq!(link.service(2_000_000, &mut port), LinkState::Disconnected);
    assert_eq!(port.opens, 1);

    assert_eq!(link.service(5_000_000, &mut port), LinkState::Disconnected);
    assert_eq!(port.opens, 2);
    assert_eq!(link.service(7_000_000, &mut port), LinkState::Disconnected);
    assert_eq!(port.opens, 2);
    assert_eq!(link.service(10_000_000, &mut port), LinkState::Disconnected);
    assert_eq!(port.opens, 3);

    // Fourth attempt lands once the broker accepts again.
    assert_eq!(link.service(15_000_000, &mut port), LinkState::Connecting);
    assert_eq!(link.on_opened(15_000_100, &mut port), LinkState::Connected);

    let stats = link.stats();
    assert_eq!(stats.attempts, 4);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.connects, 1);
}

#[test]
fn silent_broker_times_out_the_handshake() {
    let mut link = supervisor(9);
    let mut port = FlakyPort::default();

    // The socket opens but no acknowledgment ever arrives.
    assert_eq!(link.service(0, &mut port), LinkState::Connecting);
    assert_eq!(link.service(1_000_000, &mut port), LinkState::Connecting);
    assert_eq!(link.service(5_000_000, &mut port), LinkState::Disconnected);

    assert_eq!(link.service(10_000_000, &mut port), LinkState::Connecting);
    assert_eq!(link.service(15_000_000, &mut port), LinkState::Disconnected);

    assert_eq!(port.opens, 2);
    let stats = link.stats();
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.connects, 0);
}

#[test]
fn outage_publishes_are_dropped_not_queued() {
    let id = NodeId::new(9);
    let mut link = supervisor(9);
    link.add_subscription(wire::command_topic(id))
        .expect("room for one subscription");
    let mut port = FlakyPort::default();

    assert_eq!(link.service(0, &mut port), LinkState::Connecting);
    assert_eq!(link.on_opened(100, &mut port), LinkState::Connected);
    assert_eq!(port.subscribed, ["/base_stations/9"]);

    link.publish(200, &mut port, "distances/9", "100.00")
        .expect("publish while connected");

    assert_eq!(link.on_closed(1_000_000), LinkState::Disconnected);
    assert_eq!(
        link.publish(1_000_100, &mut port, "distances/9", "200.00"),
        Err(PublishError::NotConnected)
    );
    assert_eq!(
        link.publish(1_000_200, &mut port, "distances/9", "300.00"),
        Err(PublishError::NotConnected)
    );
    assert_eq!(link.stats().dropped, 2);

    // Reconnect re-runs the subscriptions, then fresh samples flow again.
    assert_eq!(link.service(6_000_000, &mut port), LinkState::Connecting);
    assert_eq!(link.on_opened(6_000_100, &mut port), LinkState::Connected);
    assert_eq!(port.subscribed, ["/base_stations/9", "/base_stations/9"]);

    link.publish(6_001_000, &mut port, "distances/9", "400.00")
        .expect("publish after reconnect");

    // The outage samples never show up late.
    let payloads: Vec<&str> = port.published.iter().map(|(_, p)| p.as_str()).collect();
    assert_eq!(payloads, ["100.00", "400.00"]);
}

#[test]
fn transport_write_failure_recycles_the_link() {
    let mut link = supervisor(9);
    let mut port = FlakyPort::default();

    assert_eq!(link.service(0, &mut port), LinkState::Connecting);
    assert_eq!(link.on_opened(100, &mut port), LinkState::Connected);

    port.refuse_publish = true;
    assert_eq!(
        link.publish(500, &mut port, "distances/9", "100.00"),
        Err(PublishError::LinkLost)
    );
    assert_eq!(link.state(), LinkState::Disconnected);
    assert_eq!(link.stats().failures, 1);

    port.refuse_publish = false;
    assert_eq!(link.service(5_000_500, &mut port), LinkState::Connecting);
    assert_eq!(link.on_opened(5_000_600, &mut port), LinkState::Connected);
    link.publish(5_001_000, &mut port, "distances/9", "150.00")
        .expect("publish after recovery");
    assert_eq!(link.stats().published, 1);
}
