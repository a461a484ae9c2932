use std::time::Duration;

use ranging_core::control::{EmitControl, EmitDecision, IgnoreReason};
use ranging_core::cycle::{CycleOutcome, MeasurementCycle, RejectReason};
use ranging_core::link::{LinkPort, LinkState, LinkSupervisor, PublishError};
use ranging_core::node::{
    EmitMode, IdentityStore, NodeConfig, NodeId, NodeRole, startup_identity,
};
use ranging_core::ranging::presence::{PresenceDetector, PresenceUpdate};
use ranging_core::ranging::smoothing::DistanceSmoother;
use ranging_core::ranging::{EchoInput, MicrosClock, PulseDriver};
use ranging_core::shell::status::{StatusProvider, StatusSnapshot};
use ranging_core::shell::{LineOutcome, ShellMode, ShellSession};
use ranging_core::telemetry::{EventInstant, EventRecorder, NodeEventKind};
use ranging_core::wire::{self, ClientId};

/// Echo rise delay after the trigger pulse. Longer than the post-clear
/// settle so the capture observes the rising edge itself and the measured
/// width matches the scripted one exactly.
const ECHO_LAG_MICROS: u64 = 3_000;

/// Echo width scripted at startup, roughly 1.25 m of round trip.
const DEFAULT_ECHO_MICROS: u64 = 7_400;

/// Clock advance for a bare `step`.
const DEFAULT_STEP_MILLIS: u64 = 100;

const DIRECTIVE_HELP: &[&str] = &[
    "Simulator directives:",
    "  sync                 - deliver one synchronization edge (ranging)",
    "  echo <micros>|none   - script the reflected echo width",
    "  step [millis]        - advance the clock and service the link",
    "  link up|down         - drive the modem session",
    "  emit <payload>       - inject a control payload (emitter)",
    "  detect 0|1 [count]   - push raw detections (receiver)",
    "  events               - dump the node event log",
    "  exit                 - quit the emulator",
    "Anything else goes to the node shell:",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    Ranging,
    Emitter,
    Receiver,
}

impl Profile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("ranging") {
            Ok(Self::Ranging)
        } else if tag.eq_ignore_ascii_case("emitter") {
            Ok(Self::Emitter)
        } else if tag.eq_ignore_ascii_case("receiver") {
            Ok(Self::Receiver)
        } else {
            Err(format!("Unknown profile `{tag}`"))
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Profile::Ranging => "ranging",
            Profile::Emitter => "emitter",
            Profile::Receiver => "receiver",
        }
    }

    fn config(self, id: NodeId) -> NodeConfig {
        match self {
            Profile::Ranging => NodeConfig::ranging(id),
            Profile::Emitter => NodeConfig::emitter(id, EmitMode::Broadcast),
            Profile::Receiver => NodeConfig::receiver(id),
        }
    }
}

/// One emulated node: the core pipeline wired to a scripted probe, an
/// in-memory modem, and a simulated microsecond clock.
pub struct Session {
    config: NodeConfig,
    probe: ScriptedProbe,
    cycle: MeasurementCycle,
    supervisor: LinkSupervisor,
    port: MemoryLink,
    shell: ShellSession<MemoryIdStore>,
    control: Option<EmitControl>,
    detector: Option<PresenceDetector>,
    events: EventRecorder<SimInstant>,
    last_estimate: Option<f32>,
    present: Option<bool>,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        let mut store = MemoryIdStore::default();
        let id = startup_identity(&mut store);
        let config = profile.config(id);

        let control = match config.role {
            NodeRole::Emitter => Some(EmitControl::new(id, config.emit)),
            _ => None,
        };
        let mut supervisor = LinkSupervisor::new(wire::client_id(id), config.link);
        if let Some(control) = &control {
            supervisor
                .add_subscription(control.control_topic())
                .expect("role subscriptions fit the link's list");
        }

        let detector = match config.role {
            NodeRole::Receiver => Some(PresenceDetector::new()),
            _ => None,
        };

        Self {
            config,
            probe: ScriptedProbe::new(Some(DEFAULT_ECHO_MICROS)),
            cycle: MeasurementCycle::new(config.capture, config.window, DistanceSmoother::new()),
            supervisor,
            port: MemoryLink::default(),
            shell: ShellSession::new(id, store),
            control,
            detector,
            events: EventRecorder::new(),
            last_estimate: None,
            present: None,
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();

        // A modal shell (mid `change_id`) owns every line until it is done.
        if self.shell.mode() != ShellMode::Command {
            return self.forward_to_shell(line);
        }

        let Some(head) = line.split_whitespace().next() else {
            return Vec::new();
        };
        let rest = line[head.len()..].trim();

        match head.to_ascii_lowercase().as_str() {
            "sync" => self.run_cycle(),
            "echo" => self.set_echo(rest),
            "step" => self.advance(rest),
            "link" => self.drive_link(rest),
            "emit" => self.inject_emit(rest),
            "detect" => self.push_detection(rest),
            "events" => self.list_events(),
            "help" => self.help(),
            _ => self.forward_to_shell(line),
        }
    }

    fn run_cycle(&mut self) -> Vec<String> {
        if self.config.role != NodeRole::Ranging {
            return vec!["sync: only ranging nodes run measurement cycles".to_string()];
        }

        let now = SimInstant(self.probe.now);
        self.events.record_sync_edge(now);

        let mut lines = Vec::new();
        match self.cycle.run(&mut self.probe, self.supervisor.is_connected()) {
            Ok(outcome) => {
                self.events.record_cycle_outcome(&outcome, now);
                match outcome {
                    CycleOutcome::Published {
                        raw_micros,
                        estimate,
                    } => {
                        self.last_estimate = Some(estimate);
                        lines.push(format!(
                            "sync: echo {raw_micros}us accepted, estimate {estimate:.2}us"
                        ));
                        let topic = wire::distance_topic(self.config.id);
                        let payload = wire::distance_payload(estimate);
                        self.publish(topic.as_str(), payload.as_str(), &mut lines);
                    }
                    CycleOutcome::Dropped {
                        raw_micros,
                        estimate,
                    } => {
                        self.last_estimate = Some(estimate);
                        lines.push(format!(
                            "sync: echo {raw_micros}us accepted, estimate {estimate:.2}us"
                        ));
                        lines.push("sync: link down, nothing published".to_string());
                    }
                    CycleOutcome::Rejected(reason) => {
                        lines.push(format!("sync: sample rejected ({})", reject_label(reason)));
                    }
                }
            }
            Err(_) => {
                lines.push("sync: trigger ignored, capture already in flight".to_string());
            }
        }
        lines
    }

    fn set_echo(&mut self, rest: &str) -> Vec<String> {
        if rest.eq_ignore_ascii_case("none") {
            self.probe.echo_width = None;
            return vec!["echo: no reflection scripted, captures will time out".to_string()];
        }

        match rest.parse::<u64>() {
            Ok(width) if width > 0 => {
                self.probe.echo_width = Some(width);
                vec![format!("echo: reflections scripted at {width}us")]
            }
            _ => vec!["echo: expected a width in microseconds or `none`".to_string()],
        }
    }

    fn advance(&mut self, rest: &str) -> Vec<String> {
        let millis = if rest.is_empty() {
            DEFAULT_STEP_MILLIS
        } else {
            match rest.parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => return vec!["step: expected a duration in milliseconds".to_string()],
            }
        };

        self.probe.now += millis * 1_000;
        let mut lines = Vec::new();
        self.service_link(&mut lines);
        lines.push(format!("t=+{}ms", self.probe.now / 1_000));
        lines
    }

    fn drive_link(&mut self, rest: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if rest.eq_ignore_ascii_case("up") {
            self.port.online = true;
            self.service_link(&mut lines);

            let before = self.supervisor.state();
            let after = self.supervisor.on_opened(self.probe.now, &mut self.port);
            self.drain_frames(&mut lines);
            if after != before {
                self.events
                    .record_link_state(after, SimInstant(self.probe.now));
            }
            lines.push(format!("link: {}", state_label(after)));
            lines
        } else if rest.eq_ignore_ascii_case("down") {
            self.port.online = false;
            let before = self.supervisor.state();
            let after = self.supervisor.on_closed(self.probe.now);
            if after != before {
                self.events
                    .record_link_state(after, SimInstant(self.probe.now));
            }
            lines.push(format!("link: {}", state_label(after)));
            lines
        } else {
            vec!["link: expected `up` or `down`".to_string()]
        }
    }

    fn inject_emit(&mut self, rest: &str) -> Vec<String> {
        let Some(control) = self.control.as_mut() else {
            return vec!["emit: this profile has no emit control".to_string()];
        };

        let decision = control.on_message(rest.as_bytes(), &mut self.probe);
        self.events
            .record_emit(decision, SimInstant(self.probe.now));
        match decision {
            EmitDecision::Fired => {
                vec![format!(
                    "emit: pulse fired (total {})",
                    self.probe.pulses_fired
                )]
            }
            EmitDecision::Ignored(reason) => {
                vec![format!("emit: ignored ({})", ignore_label(reason))]
            }
        }
    }

    fn push_detection(&mut self, rest: &str) -> Vec<String> {
        let mut parts = rest.split_whitespace();
        let detected = match parts.next() {
            Some("1") => true,
            Some("0") => false,
            _ => {
                return vec![
                    "detect: expected `1` or `0` with an optional repeat count".to_string(),
                ];
            }
        };
        let count = match parts.next() {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => return vec!["detect: repeat count must be a positive integer".to_string()],
            },
        };

        let Some(detector) = self.detector.as_mut() else {
            return vec!["detect: only receiver nodes debounce presence".to_string()];
        };

        // Pushing one value repeatedly can cross the threshold at most once.
        let mut flip: Option<PresenceUpdate> = None;
        let mut debounced = false;
        for _ in 0..count {
            let update = detector.push(detected);
            debounced = update.present;
            if update.transition.is_some() {
                flip = Some(update);
            }
        }
        self.present = Some(debounced);

        let mut lines = Vec::new();
        if let Some(update) = flip {
            self.events
                .record_presence(&update, SimInstant(self.probe.now));
            lines.push(format!(
                "presence: {}",
                if update.present { "present" } else { "absent" }
            ));
            let topic = wire::presence_topic(self.config.id);
            self.publish(
                topic.as_str(),
                wire::presence_payload(update.present),
                &mut lines,
            );
        }
        lines.push(format!(
            "detect: {count} sample{} pushed, debounced {}",
            if count == 1 { "" } else { "s" },
            if debounced { "present" } else { "absent" }
        ));
        lines
    }

    fn list_events(&self) -> Vec<String> {
        if self.events.is_empty() {
            return vec!["events: none recorded".to_string()];
        }

        self.events
            .oldest_first()
            .map(|record| {
                format!(
                    "  #{} +{}us {}",
                    record.id,
                    record.timestamp.0,
                    describe_event(record.kind)
                )
            })
            .collect()
    }

    fn help(&mut self) -> Vec<String> {
        let mut lines: Vec<String> = DIRECTIVE_HELP.iter().map(|text| (*text).to_string()).collect();
        lines.extend(self.forward_to_shell("help"));
        lines
    }

    fn forward_to_shell(&mut self, line: &str) -> Vec<String> {
        let mut provider = SnapshotProvider(self.snapshot());
        let mut reply = String::new();

        match self
            .shell
            .handle_line(line, &mut reply, &mut provider, self.probe.now)
        {
            Ok(LineOutcome::IdChanged(new_id)) => {
                self.events
                    .record_id_changed(new_id, SimInstant(self.probe.now));
            }
            Ok(LineOutcome::Quiet) => {}
            Err(_) => return vec!["shell: reply failed to format".to_string()],
        }

        reply.lines().map(str::to_string).collect()
    }

    fn publish(&mut self, topic: &str, payload: &str, lines: &mut Vec<String>) {
        let now = self.probe.now;
        match self.supervisor.publish(now, &mut self.port, topic, payload) {
            Ok(()) => self.drain_frames(lines),
            Err(PublishError::NotConnected) => {
                lines.push("link: down, publication dropped".to_string());
            }
            Err(PublishError::LinkLost) => {
                self.events
                    .record_link_state(self.supervisor.state(), SimInstant(now));
                lines.push("link: transport write failed, restarting link".to_string());
            }
        }
    }

    fn service_link(&mut self, lines: &mut Vec<String>) {
        let now = self.probe.now;
        let before = self.supervisor.state();
        let after = self.supervisor.service(now, &mut self.port);
        self.drain_frames(lines);
        if after != before {
            self.events.record_link_state(after, SimInstant(now));
            lines.push(format!("link: {}", state_label(after)));
        }
    }

    fn drain_frames(&mut self, lines: &mut Vec<String>) {
        for frame in self.port.frames.drain(..) {
            lines.push(format!("modem: {frame}"));
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            id: self.shell.id(),
            role: self.config.role,
            link: self.supervisor.state(),
            cycles: *self.cycle.stats(),
            link_stats: *self.supervisor.stats(),
            estimate_micros: self.last_estimate,
            present: self.present,
            uptime: Some(Duration::from_micros(self.probe.now)),
        }
    }
}

/// Probe whose echo goes high for a scripted width a fixed lag after each
/// trigger. Every trait call advances simulated time by one microsecond,
/// which doubles as the session clock.
struct ScriptedProbe {
    now: u64,
    fired_at: Option<u64>,
    echo_width: Option<u64>,
    pulses_fired: u32,
}

impl ScriptedProbe {
    fn new(echo_width: Option<u64>) -> Self {
        Self {
            now: 0,
            fired_at: None,
            echo_width,
            pulses_fired: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        let now = self.now;
        self.now += 1;
        now
    }
}

impl PulseDriver for ScriptedProbe {
    fn fire(&mut self) {
        self.fired_at = Some(self.now);
        self.pulses_fired += 1;
    }
}

impl EchoInput for ScriptedProbe {
    fn echo_is_high(&mut self) -> bool {
        let now = self.tick();
        match (self.fired_at, self.echo_width) {
            (Some(fired), Some(width)) => {
                let rise = fired + ECHO_LAG_MICROS;
                now >= rise && now < rise + width
            }
            _ => false,
        }
    }
}

impl MicrosClock for ScriptedProbe {
    fn now_micros(&mut self) -> u64 {
        self.tick()
    }
}

/// In-memory stand-in for the radio modem. Outbound frames are collected
/// for the narration instead of going out a UART.
#[derive(Default)]
struct MemoryLink {
    online: bool,
    frames: Vec<String>,
}

/// The scripted modem is switched off.
#[derive(Debug)]
struct Offline;

impl LinkPort for MemoryLink {
    type Error = Offline;

    fn open(&mut self, client: &ClientId) -> Result<(), Offline> {
        if !self.online {
            return Err(Offline);
        }
        self.frames.push(format!("CONNECT {client}"));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Offline> {
        if !self.online {
            return Err(Offline);
        }
        self.frames.push(format!("SUB {topic}"));
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), Offline> {
        if !self.online {
            return Err(Offline);
        }
        self.frames.push(format!("PUB {topic} {payload}"));
        Ok(())
    }
}

/// Stand-in for the firmware's flash record.
#[derive(Default)]
struct MemoryIdStore {
    stored: Option<NodeId>,
}

impl IdentityStore for MemoryIdStore {
    type Error = std::convert::Infallible;

    fn load(&mut self) -> Result<Option<NodeId>, Self::Error> {
        Ok(self.stored)
    }

    fn save(&mut self, id: NodeId) -> Result<(), Self::Error> {
        self.stored = Some(id);
        Ok(())
    }
}

/// Simulated-clock instant stored in event records.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SimInstant(u64);

impl EventInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

struct SnapshotProvider(StatusSnapshot);

impl StatusProvider<u64> for SnapshotProvider {
    fn snapshot(&mut self, _now: u64) -> Option<StatusSnapshot> {
        Some(self.0)
    }
}

fn state_label(state: LinkState) -> &'static str {
    match state {
        LinkState::Disconnected => "down, retry scheduled",
        LinkState::Connecting => "connecting",
        LinkState::Connected => "up",
    }
}

fn reject_label(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::EchoTimeout => "echo timeout",
        RejectReason::Implausible => "implausible",
    }
}

fn ignore_label(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::Malformed => "malformed",
        IgnoreReason::OtherTarget => "addressed elsewhere",
    }
}

fn describe_event(kind: NodeEventKind) -> String {
    match kind {
        NodeEventKind::SyncEdge {
            since_last: Some(gap),
        } => format!("sync edge (+{}us since last)", gap.as_micros()),
        NodeEventKind::SyncEdge { since_last: None } => "sync edge".to_string(),
        NodeEventKind::TriggerIgnored => "trigger ignored".to_string(),
        NodeEventKind::EchoAccepted { micros } => format!("echo accepted ({micros}us)"),
        NodeEventKind::EchoRejected { reason } => {
            format!("echo rejected ({})", reject_label(reason))
        }
        NodeEventKind::EstimatePublished => "estimate published".to_string(),
        NodeEventKind::PublishDropped => "publish dropped".to_string(),
        NodeEventKind::LinkConnecting => "link connecting".to_string(),
        NodeEventKind::LinkConnected => "link connected".to_string(),
        NodeEventKind::LinkLost => "link lost".to_string(),
        NodeEventKind::PresenceChanged { present } => {
            format!("presence {}", if present { "present" } else { "absent" })
        }
        NodeEventKind::EmitFired => "emit fired".to_string(),
        NodeEventKind::EmitIgnored { reason } => {
            format!("emit ignored ({})", ignore_label(reason))
        }
        NodeEventKind::IdChanged { id } => format!("id changed to {}", id.value()),
    }
}
