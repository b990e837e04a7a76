//! Application core: fill-process rules with no direct I/O.
//!
//! The [`Coordinator`](service::Coordinator) applies operator commands to
//! the relay bank and process state and produces snapshots.  Sensors and
//! subscribers are reached only through the **port traits** in [`ports`],
//! so the whole layer runs against simulated or mock hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod state;
