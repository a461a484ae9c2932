//! Telemetry link lifecycle.
//!
//! The supervisor owns the `Disconnected → Connecting → Connected` state
//! machine and its retry clock, but never blocks: `service` is polled with
//! the current time, and broker acknowledgements arrive as [`PortEvent`]s
//! fed in by whatever task pumps the transport. Failures all land in the
//! same place, a fixed backoff and another attempt. Nothing is queued
//! across an outage; a publish against a down link is dropped and counted.

use heapless::Vec;

use crate::wire::{ClientId, Topic};

/// Ack/close/message events surfaced by the transport pump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortEvent<'a> {
    /// Broker acknowledged the open handshake.
    Opened,
    /// Transport dropped or the broker closed the session.
    Closed,
    /// Inbound message on a subscribed topic.
    Message { topic: &'a str, payload: &'a [u8] },
}

/// Transport seam the supervisor drives.
///
/// Implementations are expected to be non-blocking command writers; the
/// matching acknowledgements come back later as [`PortEvent`]s.
pub trait LinkPort {
    type Error;

    /// Starts the open handshake under the given client identifier.
    fn open(&mut self, client: &ClientId) -> Result<(), Self::Error>;

    /// Requests a subscription on `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Sends one message on `topic`.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), Self::Error>;
}

/// Link lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

/// Fixed delay between connection attempts.
pub const RETRY_BACKOFF_MICROS: u64 = 5_000_000;

/// Budget for the broker to acknowledge an open handshake.
pub const CONNECT_TIMEOUT_MICROS: u64 = 5_000_000;

/// Most subscriptions any role requests at connect time.
pub const MAX_LINK_SUBSCRIPTIONS: usize = 2;

/// Retry and handshake tuning. All times in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub retry_backoff_micros: u64,
    pub connect_timeout_micros: u64,
}

impl LinkConfig {
    pub const DEFAULT: Self = Self {
        retry_backoff_micros: RETRY_BACKOFF_MICROS,
        connect_timeout_micros: CONNECT_TIMEOUT_MICROS,
    };
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Why a publish did not go out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishError {
    /// Link was not in `Connected`; the sample is gone, not queued.
    NotConnected,
    /// The transport rejected the write; the link restarts.
    LinkLost,
}

/// Error adding a connect-time subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionListFull;

/// Running totals for the link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Open handshakes started.
    pub attempts: u32,
    /// Handshakes that reached `Connected`.
    pub connects: u32,
    /// Failures of any kind (open refused, handshake timeout, close, write).
    pub failures: u32,
    /// Messages successfully handed to the transport.
    pub published: u32,
    /// Publishes dropped because the link was down.
    pub dropped: u32,
}

/// Drives one transport through the link lifecycle.
#[derive(Debug)]
pub struct LinkSupervisor {
    state: LinkState,
    config: LinkConfig,
    client: ClientId,
    subscriptions: Vec<Topic, MAX_LINK_SUBSCRIPTIONS>,
    next_attempt_at: Option<u64>,
    connect_deadline: Option<u64>,
    stats: LinkStats,
}

impl LinkSupervisor {
    #[must_use]
    pub fn new(client: ClientId, config: LinkConfig) -> Self {
        Self {
            state: LinkState::Disconnected,
            config,
            client,
            subscriptions: Vec::new(),
            next_attempt_at: None,
            connect_deadline: None,
            stats: LinkStats::default(),
        }
    }

    /// Registers a topic to subscribe on every successful handshake.
    pub fn add_subscription(&mut self, topic: Topic) -> Result<(), SubscriptionListFull> {
        self.subscriptions
            .push(topic)
            .map_err(|_| SubscriptionListFull)
    }

    /// Polls the lifecycle: starts an attempt when the backoff allows it
    /// and recycles a handshake that outlived its budget.
    pub fn service<P: LinkPort>(&mut self, now: u64, port: &mut P) -> LinkState {
        match self.state {
            LinkState::Disconnected => {
                if self.next_attempt_at.is_none_or(|at| now >= at) {
                    self.stats.attempts = self.stats.attempts.saturating_add(1);
                    match port.open(&self.client) {
                        Ok(()) => {
                            self.state = LinkState::Connecting;
                            self.connect_deadline =
                                Some(now.saturating_add(self.config.connect_timeout_micros));
                        }
                        Err(_) => self.fail(now),
                    }
                }
            }
            LinkState::Connecting => {
                if self.connect_deadline.is_some_and(|deadline| now >= deadline) {
                    self.fail(now);
                }
            }
            LinkState::Connected => {}
        }
        self.state
    }

    /// Handles the broker's open acknowledgement: subscribes the role's
    /// topics and settles into `Connected`. Stale acks are ignored.
    pub fn on_opened<P: LinkPort>(&mut self, now: u64, port: &mut P) -> LinkState {
        if self.state != LinkState::Connecting {
            return self.state;
        }

        for topic in &self.subscriptions {
            if port.subscribe(topic).is_err() {
                self.fail(now);
                return self.state;
            }
        }

        self.state = LinkState::Connected;
        self.connect_deadline = None;
        self.next_attempt_at = None;
        self.stats.connects = self.stats.connects.saturating_add(1);
        self.state
    }

    /// Handles a transport close. A close while already down is stale.
    pub fn on_closed(&mut self, now: u64) -> LinkState {
        if self.state != LinkState::Disconnected {
            self.fail(now);
        }
        self.state
    }

    /// Sends one message, or reports why it could not go out.
    ///
    /// A write failure restarts the link; the message itself is never
    /// retried.
    pub fn publish<P: LinkPort>(
        &mut self,
        now: u64,
        port: &mut P,
        topic: &str,
        payload: &str,
    ) -> Result<(), PublishError> {
        if self.state != LinkState::Connected {
            self.stats.dropped = self.stats.dropped.saturating_add(1);
            return Err(PublishError::NotConnected);
        }

        match port.publish(topic, payload) {
            Ok(()) => {
                self.stats.published = self.stats.published.saturating_add(1);
                Ok(())
            }
            Err(_) => {
                self.fail(now);
                Err(PublishError::LinkLost)
            }
        }
    }

    fn fail(&mut self, now: u64) {
        self.state = LinkState::Disconnected;
        self.connect_deadline = None;
        self.next_attempt_at = Some(now.saturating_add(self.config.retry_backoff_micros));
        self.stats.failures = self.stats.failures.saturating_add(1);
    }

    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    #[must_use]
    pub const fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Earliest time the next open attempt may start, if throttled.
    #[must_use]
    pub const fn next_attempt_at(&self) -> Option<u64> {
        self.next_attempt_at
    }
}
