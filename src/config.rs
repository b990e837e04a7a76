//! Rig configuration parameters.
//!
//! [`RigConfig`] holds every tunable number of the rig: pin map, bus
//! addresses, load-cell scaling, probe location and timing.  The
//! simulation toggles live in [`SimulationFlags`] and come from the
//! process environment (`SIMULATE_WEIGHT`, `SIMULATE_RELAYS`, `SIMULATE`).

use serde::{Deserialize, Serialize};

use crate::pins;

/// Whether this build can talk to real peripherals at all.
pub const HARDWARE_SUPPORT: bool = cfg!(feature = "rpi");

/// Core rig configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    // --- Relays ---
    pub gpio_chip: u32,
    pub relay_pump_gpio: u32,
    pub relay_valve_gpio: u32,
    pub relay_damper_gpio: u32,

    // --- Load cell (4-20 mA into ADS1115) ---
    pub i2c_bus: u32,
    pub adc_address: u8,
    /// ADC full-scale voltage for the configured PGA gain.
    pub adc_full_scale_v: f32,
    /// Shunt that converts loop current to voltage.
    pub sense_resistor_ohms: f32,
    /// Conversion settling delay before reading the result register.
    pub adc_settle_ms: u32,
    pub loop_min_ma: f32,
    pub loop_max_ma: f32,
    /// Weight at `loop_max_ma`.
    pub max_capacity_kg: f32,

    // --- Temperature probe ---
    pub w1_devices_dir: String,
    pub probe_family_prefix: String,
    /// Centre-low value of the simulated temperature sawtooth.
    pub sim_temperature_baseline_c: f32,

    // --- Process defaults ---
    pub default_target_kg: f64,
    pub default_overrun_kg: f64,

    // --- Timing ---
    /// Sensor broadcast period (milliseconds).
    pub broadcast_interval_ms: u64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            gpio_chip: pins::GPIO_CHIP,
            relay_pump_gpio: pins::RELAY_PUMP_GPIO,
            relay_valve_gpio: pins::RELAY_VALVE_GPIO,
            relay_damper_gpio: pins::RELAY_DAMPER_GPIO,

            i2c_bus: pins::I2C_BUS,
            adc_address: pins::ADS1115_ADDR,
            adc_full_scale_v: 4.096,
            sense_resistor_ohms: 250.0, // 4-20 mA -> 1-5 V
            adc_settle_ms: 10,
            loop_min_ma: 4.0,
            loop_max_ma: 20.0,
            max_capacity_kg: 1000.0,

            w1_devices_dir: pins::W1_DEVICES_DIR.to_owned(),
            probe_family_prefix: pins::DS18B20_FAMILY_PREFIX.to_owned(),
            sim_temperature_baseline_c: 22.0,

            default_target_kg: 500.0,
            default_overrun_kg: 5.0,

            broadcast_interval_ms: 100, // 10 Hz
        }
    }
}

/// Independent simulation toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationFlags {
    /// Force the simulated weight accumulator even when an ADC is present.
    pub weight: bool,
    /// Keep relays logical-only even when GPIO is available.
    pub relays: bool,
}

impl SimulationFlags {
    /// Read the flags from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the flags through an arbitrary lookup.  A flag is set only by the
    /// exact value `1`; `SIMULATE=1` sets both.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let on = |key: &str| lookup(key).is_some_and(|v| v == "1");
        let all = on("SIMULATE");
        Self {
            weight: all || on("SIMULATE_WEIGHT"),
            relays: all || on("SIMULATE_RELAYS"),
        }
    }

    /// Combine with another set of flags (e.g. from the command line).
    pub fn merge(self, other: Self) -> Self {
        Self {
            weight: self.weight || other.weight,
            relays: self.relays || other.relays,
        }
    }

    /// Weight simulation is active when forced or when the build has no
    /// hardware support to fall back on.
    pub fn weight_simulated(self) -> bool {
        self.weight || !HARDWARE_SUPPORT
    }

    /// Relays run logical-only when forced or without hardware support.
    pub fn relays_simulated(self) -> bool {
        self.relays || !HARDWARE_SUPPORT
    }
}
