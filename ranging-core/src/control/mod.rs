//! Remote emit control.
//!
//! Emitter and receiver roles take fire commands off the control topic
//! instead of a local sync line. A broadcast node fires on any token; a
//! targeted node fires only when the payload names its own identifier.
//! Anything malformed is a counted no-op, never a fault.

use crate::node::{EmitMode, NodeId};
use crate::ranging::PulseDriver;
use crate::wire;

/// Longest control payload accepted before it is dismissed unread.
pub const EMIT_PAYLOAD_MAX: usize = 16;

/// What a control payload ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitDecision {
    Fired,
    Ignored(IgnoreReason),
}

/// Why a control payload did not fire the pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Empty, over-length, non-text, or not a node identifier.
    Malformed,
    /// Well-formed but addressed to a different node.
    OtherTarget,
}

/// Running totals for the control channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub fired: u32,
    pub ignored: u32,
}

/// Maps inbound control payloads to local pulse firings.
#[derive(Debug)]
pub struct EmitControl {
    id: NodeId,
    mode: EmitMode,
    stats: EmitStats,
}

impl EmitControl {
    #[must_use]
    pub const fn new(id: NodeId, mode: EmitMode) -> Self {
        Self {
            id,
            mode,
            stats: EmitStats {
                fired: 0,
                ignored: 0,
            },
        }
    }

    /// Topic this control expects to be subscribed on.
    #[must_use]
    pub fn control_topic(&self) -> wire::Topic {
        match self.mode {
            EmitMode::Broadcast => {
                wire::Topic::try_from(wire::EMIT_TOPIC).expect("shared topic fits its buffer")
            }
            EmitMode::Targeted => wire::command_topic(self.id),
        }
    }

    /// Handles one control payload, firing the pulse when it applies.
    pub fn on_message<P: PulseDriver>(&mut self, payload: &[u8], pulse: &mut P) -> EmitDecision {
        let decision = self.decide(payload);
        match decision {
            EmitDecision::Fired => {
                pulse.fire();
                self.stats.fired = self.stats.fired.saturating_add(1);
            }
            EmitDecision::Ignored(_) => {
                self.stats.ignored = self.stats.ignored.saturating_add(1);
            }
        }
        decision
    }

    fn decide(&self, payload: &[u8]) -> EmitDecision {
        if payload.is_empty() || payload.len() > EMIT_PAYLOAD_MAX {
            return EmitDecision::Ignored(IgnoreReason::Malformed);
        }

        match self.mode {
            // Any bounded token means "emit now".
            EmitMode::Broadcast => EmitDecision::Fired,
            EmitMode::Targeted => {
                let Ok(text) = core::str::from_utf8(payload) else {
                    return EmitDecision::Ignored(IgnoreReason::Malformed);
                };
                match wire::parse_node_id(text.trim()) {
                    Some(target) if target == self.id => EmitDecision::Fired,
                    Some(_) => EmitDecision::Ignored(IgnoreReason::OtherTarget),
                    None => EmitDecision::Ignored(IgnoreReason::Malformed),
                }
            }
        }
    }

    #[must_use]
    pub const fn stats(&self) -> &EmitStats {
        &self.stats
    }

    #[must_use]
    pub const fn mode(&self) -> EmitMode {
        self.mode
    }
}
