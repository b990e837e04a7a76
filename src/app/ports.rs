//! Port traits: the boundary between the coordinator and the outside world.
//!
//! ```text
//!   Sensor adapter ──▶ WeightPort / TemperaturePort ──▶ Coordinator
//!   Coordinator ──▶ SnapshotSink ──▶ hub / log / test recorder
//! ```
//!
//! Sensors are read through `&self`: a sensor guards its own mutable state
//! (bus handle, simulated accumulator), so reads never need the
//! coordinator's lock.

use core::fmt;

use serde::{Serialize, Serializer};

use super::events::Snapshot;

// ───────────────────────────────────────────────────────────────
// Sensor readings
// ───────────────────────────────────────────────────────────────

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorMode {
    /// Read from a physical device.
    Hardware,
    /// Produced by the software simulation.
    Simulated,
    /// Device unavailable; the value is the safe default.
    Offline,
}

impl fmt::Display for SensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => write!(f, "hardware"),
            Self::Simulated => write!(f, "simulated"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// A single fresh reading.  Serialises as the bare number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f32,
    pub mode: SensorMode,
}

impl SensorReading {
    pub const fn new(value: f32, mode: SensorMode) -> Self {
        Self { value, mode }
    }
}

impl Serialize for SensorReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.value)
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapters: hardware → coordinator)
// ───────────────────────────────────────────────────────────────

/// Load-cell weight in kilograms.  Never fails; faults read as zero.
pub trait WeightPort: Send + Sync {
    fn read_weight(&self) -> SensorReading;

    /// Add to the simulated accumulator.  Returns `false` (and does
    /// nothing) when this source is not simulated.
    fn simulate_add(&self, _kg: f32) -> bool {
        false
    }

    /// Zero the simulated accumulator.  Returns `false` when this source is
    /// not simulated.
    fn simulate_reset(&self) -> bool {
        false
    }

    fn mode(&self) -> SensorMode;
}

/// Probe temperature in °C.  Never fails; faults read as zero.
pub trait TemperaturePort: Send + Sync {
    fn read_temperature(&self) -> SensorReading;

    fn mode(&self) -> SensorMode;
}

// ───────────────────────────────────────────────────────────────
// Snapshot sink (driven adapter: coordinator → subscribers)
// ───────────────────────────────────────────────────────────────

/// Receives every snapshot the broadcast loop produces.  Implementations
/// must not block.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshot: &Snapshot);

    /// Number of currently attached subscribers.  A sink with none may skip
    /// the publish work entirely.
    fn subscriber_count(&self) -> usize {
        1
    }
}
