//! IBC fill controller library.
//!
//! Exposes the rig logic, drivers and adapters for the binary and for
//! integration testing.  Real peripherals are only touched with the `rpi`
//! feature; everything else runs against simulated or mock hardware.

#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod app;
pub mod broadcast;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;
