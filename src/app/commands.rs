//! Inbound event-stream commands.
//!
//! A client message `{"event": name, "data": {...}}` is decoded into a
//! [`RigCommand`] here; the [`Coordinator`](super::service::Coordinator)
//! executes it and answers with an acknowledgement event.

use serde_json::Value;

use crate::error::ValidationError;

use super::state::{FillSource, SettingsUpdate};

/// Weight added by `simulate_add_weight` when no amount is given.
pub const DEFAULT_SIM_STEP_KG: f32 = 1.0;

/// Commands accepted on the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RigCommand {
    /// Start filling.  Defaults to the tank when the `source` key is absent.
    StartFill(FillSource),
    StopFill,
    Reset,
    UpdateSettings(SettingsUpdate),
    /// Bump the simulated load cell.  Ignored unless weight is simulated.
    SimulateAddWeight(f32),
}

impl RigCommand {
    /// True for the events that only drive the simulated load cell.
    pub fn is_simulation_event(name: &str) -> bool {
        matches!(name, "simulate_add_weight" | "simulate_weight")
    }

    /// Decode an event name and its (possibly absent) data object.
    pub fn from_event(name: &str, data: &Value) -> Result<Self, ValidationError> {
        match name {
            "start_fill" => {
                let source = match data.get("source") {
                    None => FillSource::Tank,
                    Some(Value::String(s)) => FillSource::from_request(s),
                    Some(_) => FillSource::Silo,
                };
                Ok(Self::StartFill(source))
            }
            "stop_fill" => Ok(Self::StopFill),
            "reset" => Ok(Self::Reset),
            "update_settings" => {
                if data.is_null() {
                    return Ok(Self::UpdateSettings(SettingsUpdate::default()));
                }
                SettingsUpdate::from_json(data).map(Self::UpdateSettings)
            }
            "simulate_add_weight" | "simulate_weight" => {
                let kg = match data.get("add") {
                    None | Some(Value::Null) => DEFAULT_SIM_STEP_KG,
                    Some(v) => v
                        .as_f64()
                        .filter(|kg| kg.is_finite())
                        .ok_or(ValidationError::NotANumber("add"))? as f32,
                };
                Ok(Self::SimulateAddWeight(kg))
            }
            other => Err(ValidationError::UnknownEvent(other.to_owned())),
        }
    }
}
