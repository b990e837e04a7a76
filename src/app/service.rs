//! Application service: the fill coordinator.
//!
//! [`Coordinator`] owns the relay bank and the process state together in a
//! single `Rig` aggregate behind one mutex, plus the two sensor ports.
//! It is shared as `Arc<Coordinator>` between transport client threads and
//! the broadcast loop.
//!
//! ```text
//!  WeightPort ──────▶ ┌──────────────────────────┐ ──▶ Snapshot
//!  TemperaturePort ──▶│       Coordinator        │
//!                     │  Mutex<Rig{relays,state}>│
//!  commands ─────────▶└──────────────────────────┘ ──▶ ack RigEvent
//! ```
//!
//! Every handler does all of its relay and state writes inside one
//! critical section, so a snapshot never sees half a transition.  Sensor
//! reads happen outside the lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::config::RigConfig;
use crate::drivers::relay::{RelayBank, RelayId, RelayStates};
use crate::error::ValidationError;
use crate::sensors::SensorSet;

use super::commands::RigCommand;
use super::events::{RigEvent, Snapshot, StatusReport};
use super::ports::{SensorMode, TemperaturePort, WeightPort};
use super::state::{FillPhase, FillSource, ProcessState, SettingsUpdate};

// ───────────────────────────────────────────────────────────────
// Rig aggregate
// ───────────────────────────────────────────────────────────────

/// Everything a command handler may mutate.
struct Rig {
    relays: RelayBank,
    state: ProcessState,
}

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

pub struct Coordinator {
    rig: Mutex<Rig>,
    weight: Box<dyn WeightPort>,
    temperature: Box<dyn TemperaturePort>,
    hardware_mode: bool,
}

impl Coordinator {
    /// Assemble a coordinator from arbitrary sensor ports.
    pub fn new(
        relays: RelayBank,
        weight: Box<dyn WeightPort>,
        temperature: Box<dyn TemperaturePort>,
        config: &RigConfig,
        hardware_mode: bool,
    ) -> Self {
        Self {
            rig: Mutex::new(Rig {
                relays,
                state: ProcessState::new(config),
            }),
            weight,
            temperature,
            hardware_mode,
        }
    }

    /// Assemble a coordinator from the sensors selected at startup.
    pub fn from_sensors(
        relays: RelayBank,
        sensors: SensorSet,
        config: &RigConfig,
        hardware_mode: bool,
    ) -> Self {
        let SensorSet {
            weight,
            temperature,
        } = sensors;
        Self::new(relays, Box::new(weight), Box::new(temperature), config, hardware_mode)
    }

    /// Lock the rig.  A poisoned lock is recovered so that stop and
    /// emergency stop keep working after a panicking handler.
    fn lock(&self) -> MutexGuard<'_, Rig> {
        self.rig.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Fill control ──────────────────────────────────────────

    pub fn start_fill(&self, source: FillSource) {
        let mut rig = self.lock();
        rig.state.begin_fill(source);
        match source {
            FillSource::Tank => {
                rig.relays.set(RelayId::Pump, true);
                rig.relays.set(RelayId::Valve, true);
            }
            FillSource::Silo => rig.relays.set(RelayId::Damper, true),
        }
        drop(rig);
        info!("Fill started from {source}");
    }

    /// Relays off, fill ended.  The last source stays set.
    pub fn stop_fill(&self) {
        let mut rig = self.lock();
        rig.relays.all_off();
        rig.state.end_fill();
        drop(rig);
        info!("Fill stopped");
    }

    /// Same effect as [`stop_fill`](Self::stop_fill), callable at any time.
    pub fn emergency_stop(&self) {
        let mut rig = self.lock();
        rig.relays.all_off();
        rig.state.end_fill();
        drop(rig);
        warn!("EMERGENCY STOP");
    }

    pub fn reset(&self) {
        let mut rig = self.lock();
        rig.relays.all_off();
        rig.state.reset();
        self.weight.simulate_reset();
        drop(rig);
        info!("Rig reset");
    }

    /// Apply an already validated settings change and return the new state.
    pub fn update_settings(&self, update: &SettingsUpdate) -> ProcessState {
        if update.is_empty() {
            debug!("Settings update with no known fields");
        }
        let mut rig = self.lock();
        rig.state.apply_settings(update);
        let state = rig.state.clone();
        drop(rig);
        info!(
            "Settings: tank {}+{} kg, silo {}+{} kg",
            state.tank_target, state.tank_overrun, state.silo_target, state.silo_overrun
        );
        state
    }

    /// Switch one relay by name.  `action` equal to `on` in any case means
    /// on; every other value means off.
    pub fn set_relay(&self, name: &str, action: &str) -> Result<(RelayId, bool), ValidationError> {
        let on = action.eq_ignore_ascii_case("on");
        let id = self.lock().relays.set_by_name(name, on)?;
        Ok((id, on))
    }

    /// Add to the simulated load cell.  Returns `false` when weight is not
    /// simulated; nothing changes in that case.
    pub fn simulate_add_weight(&self, kg: f32) -> bool {
        self.weight.simulate_add(kg)
    }

    /// Move the running fill to another phase.  `Idle` ends the fill and
    /// switches every relay off.
    pub fn set_fill_phase(&self, phase: FillPhase) -> Result<(), ValidationError> {
        let mut rig = self.lock();
        rig.state.set_phase(phase)?;
        if phase == FillPhase::Idle {
            rig.relays.all_off();
        }
        drop(rig);
        info!("Fill phase: {phase:?}");
        Ok(())
    }

    /// Execute an event-stream command and produce its acknowledgement.
    /// `simulate_add_weight` has none.
    pub fn handle_command(&self, cmd: RigCommand) -> Option<RigEvent> {
        match cmd {
            RigCommand::StartFill(source) => {
                self.start_fill(source);
                Some(RigEvent::FillStarted { source })
            }
            RigCommand::StopFill => {
                self.stop_fill();
                Some(RigEvent::FillStopped)
            }
            RigCommand::Reset => {
                self.reset();
                Some(RigEvent::ResetComplete)
            }
            RigCommand::UpdateSettings(update) => {
                Some(RigEvent::SettingsUpdated(self.update_settings(&update)))
            }
            RigCommand::SimulateAddWeight(kg) => {
                self.simulate_add_weight(kg);
                None
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Sample both sensors, then capture relays and state together.
    pub fn snapshot(&self) -> Snapshot {
        let weight = self.weight.read_weight();
        let temperature = self.temperature.read_temperature();
        let rig = self.lock();
        Snapshot {
            weight,
            temperature,
            relays: rig.relays.states(),
            state: rig.state.clone(),
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::new(self.snapshot(), self.hardware_mode)
    }

    pub fn state(&self) -> ProcessState {
        self.lock().state.clone()
    }

    pub fn relay_states(&self) -> RelayStates {
        self.lock().relays.states()
    }

    pub fn weight_mode(&self) -> SensorMode {
        self.weight.mode()
    }

    pub fn temperature_mode(&self) -> SensorMode {
        self.temperature.mode()
    }

    pub fn relays_attached(&self) -> bool {
        self.lock().relays.is_attached()
    }

    /// Greeting for a newly subscribed client.
    pub fn connected_event(&self) -> RigEvent {
        RigEvent::Connected {
            on_raspberry_pi: self.hardware_mode,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// All relays off, then release every pin.  Idempotent.
    pub fn shutdown(&self) {
        let mut rig = self.lock();
        rig.relays.all_off();
        rig.state.end_fill();
        rig.relays.release();
        drop(rig);
        info!("Coordinator shut down");
    }
}
