//! Fuzz target: `session::handle_line`
//!
//! Runs arbitrary text against a simulated coordinator.  Whatever the
//! line does, the relays must be off again after an emergency stop.
//!
//! cargo fuzz run fuzz_inbound_line

#![no_main]

use ibcfill::api::session::handle_line;
use ibcfill::app::service::Coordinator;
use ibcfill::config::RigConfig;
use ibcfill::drivers::relay::RelayBank;
use ibcfill::sensors::SensorSet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    let config = RigConfig::default();
    let sensors = SensorSet::simulated(&config);
    let coordinator = Coordinator::from_sensors(RelayBank::detached(), sensors, &config, false);

    let _ = handle_line(&coordinator, line);
    let _ = coordinator.snapshot();

    coordinator.emergency_stop();
    assert!(!coordinator.relay_states().any_on());
    assert!(!coordinator.state().filling);
});
