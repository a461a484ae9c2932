//! Hardware adapters binding GPIO and flash peripherals to the core seams.

pub mod idstore;
pub mod sonar;
