//! Node identity, role selection, and the assembled node configuration.
//!
//! Everything a node needs to run lives in one owned [`NodeConfig`] value so
//! the firmware and the emulator construct the same pipeline from the same
//! inputs. There are no module-level singletons anywhere in the pipeline.

use core::fmt;

use crate::link::LinkConfig;
use crate::ranging::CaptureConfig;
use crate::ranging::validity::PlausibilityWindow;

/// Persisted 16-bit node identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(u16);

impl NodeId {
    /// Identifier used when the persistent store is blank.
    pub const DEFAULT: Self = Self(0);

    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which parts of the pipeline this node wires up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeRole {
    /// Fires its own pulse, times the echo, publishes smoothed distances.
    #[default]
    Ranging,
    /// Fires a pulse when commanded over the control channel.
    Emitter,
    /// Watches the echo line and reports debounced presence changes.
    Receiver,
}

impl NodeRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeRole::Ranging => "ranging",
            NodeRole::Emitter => "emitter",
            NodeRole::Receiver => "receiver",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing scheme for inbound emit commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmitMode {
    /// Any well-formed command fires the pulse.
    #[default]
    Broadcast,
    /// Only commands naming this node's identifier fire the pulse.
    Targeted,
}

/// What starts a measurement cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleTrigger {
    /// The wired synchronization edge shared across the fleet.
    SyncEdge,
    /// A free-running local timer.
    Periodic { period_micros: u64 },
}

/// Cadence of presence sampling for receiver nodes.
pub const PRESENCE_PERIOD_MICROS: u64 = 50_000;

/// One node's full configuration, owned by whoever assembles the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: NodeId,
    pub role: NodeRole,
    pub trigger: CycleTrigger,
    pub emit: EmitMode,
    pub capture: CaptureConfig,
    pub window: PlausibilityWindow,
    pub link: LinkConfig,
    pub presence_period_micros: u64,
}

impl NodeConfig {
    /// Ranging node triggered by the fleet synchronization line.
    #[must_use]
    pub const fn ranging(id: NodeId) -> Self {
        Self {
            id,
            role: NodeRole::Ranging,
            trigger: CycleTrigger::SyncEdge,
            emit: EmitMode::Broadcast,
            capture: CaptureConfig::DEFAULT,
            window: PlausibilityWindow::DEFAULT,
            link: LinkConfig::DEFAULT,
            presence_period_micros: PRESENCE_PERIOD_MICROS,
        }
    }

    /// Emitter node listening for commands in the given addressing mode.
    #[must_use]
    pub const fn emitter(id: NodeId, emit: EmitMode) -> Self {
        let mut config = Self::ranging(id);
        config.role = NodeRole::Emitter;
        config.emit = emit;
        config
    }

    /// Passive receiver node sampling presence on a local timer.
    #[must_use]
    pub const fn receiver(id: NodeId) -> Self {
        let mut config = Self::ranging(id);
        config.role = NodeRole::Receiver;
        config
    }
}

/// Backing store for the persisted node identifier.
///
/// The pipeline reads the identifier once at startup; only the operator
/// shell's `change_id` command writes it back.
pub trait IdentityStore {
    type Error;

    /// Reads the stored identifier. `Ok(None)` means the store is blank.
    fn load(&mut self) -> Result<Option<NodeId>, Self::Error>;

    /// Persists a new identifier.
    fn save(&mut self, id: NodeId) -> Result<(), Self::Error>;
}

/// Resolves the startup identity: a stored value if one exists, otherwise
/// [`NodeId::DEFAULT`]. Store read errors also fall back to the default so
/// a corrupt store never keeps a node off the air.
pub fn startup_identity<S: IdentityStore>(store: &mut S) -> NodeId {
    match store.load() {
        Ok(Some(id)) => id,
        Ok(None) | Err(_) => NodeId::DEFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(Option<NodeId>);

    impl IdentityStore for FixedStore {
        type Error = ();

        fn load(&mut self) -> Result<Option<NodeId>, ()> {
            Ok(self.0)
        }

        fn save(&mut self, id: NodeId) -> Result<(), ()> {
            self.0 = Some(id);
            Ok(())
        }
    }

    struct BrokenStore;

    impl IdentityStore for BrokenStore {
        type Error = ();

        fn load(&mut self) -> Result<Option<NodeId>, ()> {
            Err(())
        }

        fn save(&mut self, _id: NodeId) -> Result<(), ()> {
            Err(())
        }
    }

    #[test]
    fn startup_identity_prefers_stored_value() {
        let mut store = FixedStore(Some(NodeId::new(7)));
        assert_eq!(startup_identity(&mut store), NodeId::new(7));
    }

    #[test]
    fn blank_store_falls_back_to_default() {
        let mut store = FixedStore(None);
        assert_eq!(startup_identity(&mut store), NodeId::DEFAULT);
    }

    #[test]
    fn unreadable_store_falls_back_to_default() {
        let mut store = BrokenStore;
        assert_eq!(startup_identity(&mut store), NodeId::DEFAULT);
    }

    #[test]
    fn role_constructors_wire_the_expected_components() {
        let ranging = NodeConfig::ranging(NodeId::new(3));
        assert_eq!(ranging.role, NodeRole::Ranging);
        assert_eq!(ranging.trigger, CycleTrigger::SyncEdge);

        let emitter = NodeConfig::emitter(NodeId::new(3), EmitMode::Targeted);
        assert_eq!(emitter.role, NodeRole::Emitter);
        assert_eq!(emitter.emit, EmitMode::Targeted);

        let receiver = NodeConfig::receiver(NodeId::new(3));
        assert_eq!(receiver.role, NodeRole::Receiver);
        assert_eq!(receiver.presence_period_micros, PRESENCE_PERIOD_MICROS);
    }
}
