//! Outbound application events.
//!
//! The broadcast loop emits a [`Snapshot`] every tick through the
//! [`SnapshotSink`](super::ports::SnapshotSink) port; command handlers
//! answer event-stream requests with a [`RigEvent`] acknowledgement.
//! Transports decide how either reaches a client.

use serde::Serialize;
use serde_json::{Value, json};

use crate::drivers::relay::RelayStates;

use super::ports::SensorReading;
use super::state::{FillSource, ProcessState};

/// A consistent point-in-time view of the rig.
///
/// Relays and process state are captured together under the rig lock;
/// the sensor readings are taken just before.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "sensor_update")]
pub struct Snapshot {
    pub weight: SensorReading,
    pub temperature: SensorReading,
    pub relays: RelayStates,
    pub state: ProcessState,
}

/// Snapshot plus the hardware-mode flag, as returned by the status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub weight: SensorReading,
    pub temperature: SensorReading,
    pub relays: RelayStates,
    pub state: ProcessState,
    pub on_raspberry_pi: bool,
}

impl StatusReport {
    pub fn new(snapshot: Snapshot, on_raspberry_pi: bool) -> Self {
        Self {
            weight: snapshot.weight,
            temperature: snapshot.temperature,
            relays: snapshot.relays,
            state: snapshot.state,
            on_raspberry_pi,
        }
    }
}

/// Messages sent to an event-stream client.
#[derive(Debug, Clone, PartialEq)]
pub enum RigEvent {
    /// Sent once when a client subscribes.
    Connected { on_raspberry_pi: bool },
    SensorData(Snapshot),
    FillStarted { source: FillSource },
    FillStopped,
    ResetComplete,
    /// Data is the full process state after the update, unwrapped.
    SettingsUpdated(ProcessState),
    Error(String),
}

impl RigEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::SensorData(_) => "sensor_data",
            Self::FillStarted { .. } => "fill_started",
            Self::FillStopped => "fill_stopped",
            Self::ResetComplete => "reset_complete",
            Self::SettingsUpdated(_) => "settings_updated",
            Self::Error(_) => "error",
        }
    }

    pub fn data(&self) -> Value {
        match self {
            Self::Connected { on_raspberry_pi } => {
                json!({ "status": "ok", "on_raspberry_pi": on_raspberry_pi })
            }
            Self::SensorData(snapshot) => serde_json::to_value(snapshot).unwrap_or(Value::Null),
            Self::FillStarted { source } => json!({ "source": source }),
            Self::FillStopped | Self::ResetComplete => json!({}),
            Self::SettingsUpdated(state) => serde_json::to_value(state).unwrap_or(Value::Null),
            Self::Error(message) => json!({ "message": message }),
        }
    }

    /// `{"event": name, "data": …}` envelope.
    pub fn to_message(&self) -> Value {
        json!({ "event": self.name(), "data": self.data() })
    }
}
