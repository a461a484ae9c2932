#![no_std]

// Shared logic for the sonar-node fleet.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library and exposing the measurement pipeline, the link
// lifecycle, and the operator shell behind traits the other crates wire up.

pub mod control;
pub mod cycle;
pub mod link;
pub mod node;
pub mod ranging;
pub mod shell;
pub mod telemetry;
pub mod wire;
