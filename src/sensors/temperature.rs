//! DS18B20 temperature probe via the kernel 1-Wire (w1-therm) driver.
//!
//! The kernel exposes each probe as `/sys/bus/w1/devices/28-xxxxxxxxxxxx/`
//! with a `temperature` file holding the reading in millidegrees Celsius.
//! The device directory is located once at startup.
//!
//! ## Dual-mode design
//!
//! On hardware builds: reads the discovered probe; a missing probe or a
//! failed read yields 0 °C.
//! Elsewhere: a synthetic sawtooth `22.0 + (t mod 10 s) · 0.1`, plausible
//! slowly changing data with no device file involved.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info, warn};

use crate::app::ports::{SensorMode, SensorReading, TemperaturePort};
use crate::config::RigConfig;
use crate::error::HardwareFault;

/// Name of the value file inside a w1-therm device directory.
const VALUE_FILE: &str = "temperature";

const SIM_PERIOD_SECS: f64 = 10.0;
const SIM_SLOPE_C_PER_SEC: f64 = 0.1;

// ---------------------------------------------------------------------------
// Hardware path
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OneWireProbe {
    device_dir: PathBuf,
}

impl OneWireProbe {
    /// Scan `devices_dir` for the first entry whose name starts with
    /// `family_prefix`.  Entries are taken in name order.
    pub fn discover(
        devices_dir: &Path,
        family_prefix: &str,
    ) -> Result<Option<Self>, HardwareFault> {
        let entries = fs::read_dir(devices_dir).map_err(|e| {
            warn!("1-Wire scan of {} failed: {e}", devices_dir.display());
            HardwareFault::ProbeScanFailed
        })?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(family_prefix))
            .map(|entry| entry.path())
            .collect();
        matches.sort();

        Ok(matches.into_iter().next().map(|device_dir| Self { device_dir }))
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    /// Read the probe once.
    pub fn sample(&self) -> Result<f32, HardwareFault> {
        let path = self.device_dir.join(VALUE_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            warn!("Temperature read of {} failed: {e}", path.display());
            HardwareFault::ProbeReadFailed
        })?;
        let millidegrees: f64 = text.trim().parse().map_err(|_| {
            warn!("Temperature value '{}' is not a number", text.trim());
            HardwareFault::ProbeReadFailed
        })?;
        Ok((millidegrees / 1000.0) as f32)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct SimulatedTemperature {
    baseline_c: f32,
}

impl SimulatedTemperature {
    pub fn new(baseline_c: f32) -> Self {
        Self { baseline_c }
    }

    /// Value at `unix_secs` seconds since the epoch.  Always within
    /// `[baseline, baseline + 1.0)`.
    pub fn value_at(&self, unix_secs: f64) -> f32 {
        let phase = unix_secs.rem_euclid(SIM_PERIOD_SECS);
        self.baseline_c + (phase * SIM_SLOPE_C_PER_SEC) as f32
    }

    pub fn now(&self) -> f32 {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        self.value_at(secs)
    }
}

// ---------------------------------------------------------------------------
// Selected source
// ---------------------------------------------------------------------------

/// The temperature source chosen at startup.
#[derive(Debug, Clone)]
pub enum TemperatureSensor {
    Probe(OneWireProbe),
    /// Hardware build, but no probe was found.
    Missing,
    Simulated(SimulatedTemperature),
}

impl TemperatureSensor {
    /// Choose the source once.  Probe discovery only runs in a hardware
    /// context.
    pub fn select(hardware_context: bool, config: &RigConfig) -> Self {
        if !hardware_context {
            info!(
                "Temperature: simulated around {} \u{00b0}C",
                config.sim_temperature_baseline_c
            );
            return Self::Simulated(SimulatedTemperature::new(config.sim_temperature_baseline_c));
        }
        let devices_dir = Path::new(&config.w1_devices_dir);
        match OneWireProbe::discover(devices_dir, &config.probe_family_prefix) {
            Ok(Some(probe)) => {
                info!("Temperature: DS18B20 found at {}", probe.device_dir().display());
                Self::Probe(probe)
            }
            Ok(None) => {
                warn!(
                    "Temperature: no DS18B20 under {}, reading 0 \u{00b0}C",
                    config.w1_devices_dir
                );
                Self::Missing
            }
            Err(e) => {
                error!("Temperature: {e}, reading 0 \u{00b0}C");
                Self::Missing
            }
        }
    }
}

impl TemperaturePort for TemperatureSensor {
    fn read_temperature(&self) -> SensorReading {
        match self {
            Self::Probe(probe) => {
                SensorReading::new(probe.sample().unwrap_or(0.0), SensorMode::Hardware)
            }
            Self::Missing => SensorReading::new(0.0, SensorMode::Offline),
            Self::Simulated(sim) => SensorReading::new(sim.now(), SensorMode::Simulated),
        }
    }

    fn mode(&self) -> SensorMode {
        match self {
            Self::Probe(_) => SensorMode::Hardware,
            Self::Missing => SensorMode::Offline,
            Self::Simulated(_) => SensorMode::Simulated,
        }
    }
}
