//! Coordinator command handlers against the mock relay board.

use ibcfill::app::commands::RigCommand;
use ibcfill::app::events::RigEvent;
use ibcfill::app::ports::SensorMode;
use ibcfill::app::service::Coordinator;
use ibcfill::app::state::{FillPhase, FillSource, SettingsUpdate};
use ibcfill::config::RigConfig;
use ibcfill::drivers::relay::{RelayBank, RelayStates};
use ibcfill::error::ValidationError;
use ibcfill::sensors::weight::WeightSensor;
use serde_json::json;

use crate::mock_hw::{FixedTemperature, MockBoard, board_coordinator, simulated_coordinator};

#[test]
fn tank_fill_energizes_pump_and_valve_on_the_board() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    c.start_fill(FillSource::Tank);
    assert_eq!(board.levels(), (Some(false), Some(false), Some(true)));
    let s = c.state();
    assert!(s.filling);
    assert_eq!(s.fill_phase, FillPhase::Coarse);
    assert_eq!(s.fill_source, Some(FillSource::Tank));
}

#[test]
fn silo_fill_energizes_damper_only() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    c.start_fill(FillSource::Silo);
    assert_eq!(board.levels(), (Some(true), Some(true), Some(false)));
    assert_eq!(
        c.relay_states(),
        RelayStates {
            pump: false,
            valve: false,
            damper: true,
        }
    );
}

#[test]
fn stop_turns_everything_off_and_keeps_source() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    c.start_fill(FillSource::Tank);
    c.stop_fill();
    assert!(board.all_high());
    let s = c.state();
    assert!(!s.filling);
    assert_eq!(s.fill_phase, FillPhase::Idle);
    assert_eq!(s.fill_source, Some(FillSource::Tank));
}

#[test]
fn emergency_stop_from_any_state() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    c.emergency_stop();
    assert!(board.all_high());

    c.start_fill(FillSource::Silo);
    c.set_relay("pump", "on").unwrap();
    c.emergency_stop();
    assert!(board.all_high());
    assert!(!c.relay_states().any_on());
    assert!(!c.state().filling);
}

#[test]
fn reset_zeroes_weights_and_accumulator() {
    let c = simulated_coordinator();
    c.simulate_add_weight(250.0);
    c.start_fill(FillSource::Silo);
    c.reset();
    let snap = c.snapshot();
    assert_eq!(snap.weight.value, 0.0);
    assert_eq!(snap.state.tank_weight, 0.0);
    assert_eq!(snap.state.silo_weight, 0.0);
    assert_eq!(snap.state.fill_source, None);
    assert_eq!(snap.state.fill_phase, FillPhase::Idle);
}

#[test]
fn simulated_weight_clamps_at_capacity() {
    let c = simulated_coordinator();
    c.simulate_add_weight(5.0);
    c.simulate_add_weight(5.0);
    assert_eq!(c.snapshot().weight.value, 10.0);
    c.simulate_add_weight(1100.0);
    assert_eq!(c.snapshot().weight.value, 1000.0);
}

#[test]
fn simulate_add_is_noop_without_simulation() {
    let config = RigConfig::default();
    let c = Coordinator::new(
        RelayBank::detached(),
        Box::new(WeightSensor::Offline),
        Box::new(FixedTemperature(21.5)),
        &config,
        true,
    );
    assert!(!c.simulate_add_weight(50.0));
    let status = c.status();
    assert_eq!(status.weight.value, 0.0);
    assert_eq!(status.weight.mode, SensorMode::Offline);
    assert_eq!(status.temperature.value, 21.5);
    assert!(status.on_raspberry_pi);
    c.reset();
}

#[test]
fn settings_partial_and_atomic() {
    let c = simulated_coordinator();
    let update = SettingsUpdate::from_json(&json!({"tank_target": 750})).unwrap();
    let s = c.update_settings(&update);
    assert_eq!(s.tank_target, 750.0);
    assert_eq!(s.silo_target, 500.0);
    assert_eq!(s.tank_overrun, 5.0);

    let rejected = RigCommand::from_event(
        "update_settings",
        &json!({"silo_target": 600, "tank_overrun": "abc"}),
    );
    assert_eq!(rejected, Err(ValidationError::NotANumber("tank_overrun")));
    assert_eq!(c.state().silo_target, 500.0);
}

#[test]
fn fill_phase_transitions() {
    let c = simulated_coordinator();
    assert_eq!(c.set_fill_phase(FillPhase::Fine), Err(ValidationError::NotFilling));
    c.start_fill(FillSource::Tank);
    c.set_fill_phase(FillPhase::Fine).unwrap();
    assert_eq!(c.state().fill_phase, FillPhase::Fine);
    assert!(c.relay_states().pump);
    c.set_fill_phase(FillPhase::Idle).unwrap();
    let s = c.state();
    assert!(!s.filling);
    assert_eq!(s.fill_phase, FillPhase::Idle);
    assert!(!c.relay_states().any_on());
}

#[test]
fn event_commands_round_trip_through_handle_command() {
    let c = simulated_coordinator();
    let cmd = RigCommand::from_event("start_fill", &json!({"source": "silo"})).unwrap();
    assert_eq!(
        c.handle_command(cmd),
        Some(RigEvent::FillStarted { source: FillSource::Silo })
    );
    let cmd = RigCommand::from_event("reset", &json!({})).unwrap();
    assert_eq!(c.handle_command(cmd), Some(RigEvent::ResetComplete));
    assert!(!c.relay_states().any_on());
}

#[test]
fn shutdown_leaves_lines_high_and_released() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    c.start_fill(FillSource::Tank);
    c.shutdown();
    assert!(board.all_high());
    assert_eq!(board.pump.other_handles(), 0);
    assert_eq!(board.valve.other_handles(), 0);
    assert_eq!(board.damper.other_handles(), 0);
    assert!(!c.relays_attached());

    // Still usable, logically.
    c.set_relay("damper", "on").unwrap();
    assert!(c.relay_states().damper);
}

#[test]
fn pin_panic_under_lock_still_allows_emergency_stop() {
    use std::sync::Arc;

    let board = MockBoard::new();
    let c = Arc::new(board_coordinator(&board));
    c.start_fill(FillSource::Tank);
    assert_eq!(board.pump.last(), Some(false));

    // The pump write panics while the rig lock is held, poisoning it.
    board.pump.set_panicking(true);
    let c2 = Arc::clone(&c);
    let joined = std::thread::spawn(move || c2.set_relay("pump", "off")).join();
    assert!(joined.is_err());
    board.pump.set_panicking(false);

    c.emergency_stop();
    assert!(board.all_high());
    assert!(!c.status().state.filling);

    c.start_fill(FillSource::Tank);
    assert_eq!(board.pump.last(), Some(false));
    c.stop_fill();
    assert!(board.all_high());
}
