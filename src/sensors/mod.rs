//! Sensor subsystem: load cell and temperature probe.
//!
//! Each sensor has a hardware-backed and a simulated implementation behind
//! one port trait ([`WeightPort`], [`TemperaturePort`]).  Which one runs is
//! decided once, in [`SensorSet::select`], from the simulation flags and
//! whether the process runs on the target board.
//!
//! [`WeightPort`]: crate::app::ports::WeightPort
//! [`TemperaturePort`]: crate::app::ports::TemperaturePort

pub mod temperature;
pub mod weight;

use crate::app::ports::WeightPort;
use crate::config::{RigConfig, SimulationFlags};
use crate::error::HardwareFault;
use temperature::TemperatureSensor;
use weight::WeightSensor;

/// Both sensors, as selected at startup.
pub struct SensorSet {
    pub weight: WeightSensor,
    pub temperature: TemperatureSensor,
}

impl SensorSet {
    /// Select both sensors.  `open_scale` is only called when the hardware
    /// scale is wanted; the probe is only looked for on the target board.
    pub fn select(
        flags: SimulationFlags,
        config: &RigConfig,
        on_board: bool,
        open_scale: impl FnOnce() -> Result<Box<dyn WeightPort>, HardwareFault>,
    ) -> Self {
        Self {
            weight: WeightSensor::select(flags.weight_simulated(), config, open_scale),
            temperature: TemperatureSensor::select(on_board, config),
        }
    }

    /// Fully simulated sensors, regardless of build features.
    pub fn simulated(config: &RigConfig) -> Self {
        Self {
            weight: WeightSensor::select(true, config, || Err(HardwareFault::BusOpenFailed)),
            temperature: TemperatureSensor::select(false, config),
        }
    }
}
