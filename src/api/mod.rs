//! Command API: transport-neutral request routing and event dispatch.
//!
//! [`codec`] frames newline-delimited JSON, [`session`] classifies each
//! line, and [`rest`] routes REST-style requests onto the coordinator.

pub mod codec;
pub mod rest;
pub mod session;
