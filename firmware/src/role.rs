#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Compile-time role selection.
//!
//! One binary serves one role; the `role-ranging`, `role-emitter`, and
//! `role-receiver` features pick which tasks the runtime spawns. With
//! several role features enabled (as under `--all-features`) ranging wins,
//! then emitter.

use ranging_core::node::{EmitMode, NodeConfig, NodeId, NodeRole};

#[cfg(not(any(
    feature = "role-ranging",
    feature = "role-emitter",
    feature = "role-receiver"
)))]
compile_error!("select a node role: role-ranging, role-emitter, or role-receiver");

/// Role baked into this binary.
#[cfg(feature = "role-ranging")]
pub const ROLE: NodeRole = NodeRole::Ranging;
#[cfg(all(feature = "role-emitter", not(feature = "role-ranging")))]
pub const ROLE: NodeRole = NodeRole::Emitter;
#[cfg(all(
    feature = "role-receiver",
    not(any(feature = "role-ranging", feature = "role-emitter"))
))]
pub const ROLE: NodeRole = NodeRole::Receiver;

/// Addressing scheme used by emitter builds.
pub const EMIT_MODE: EmitMode = EmitMode::Broadcast;

/// Builds the node configuration for the compiled role.
#[must_use]
pub fn node_config(id: NodeId) -> NodeConfig {
    match ROLE {
        NodeRole::Ranging => NodeConfig::ranging(id),
        NodeRole::Emitter => NodeConfig::emitter(id, EMIT_MODE),
        NodeRole::Receiver => NodeConfig::receiver(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "role-ranging")]
    #[test]
    fn the_default_build_is_a_ranging_node() {
        let config = node_config(NodeId::new(3));
        assert_eq!(config.role, NodeRole::Ranging);
        assert_eq!(config.id, NodeId::new(3));
    }
}
