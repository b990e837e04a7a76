//! Industrial load cell: 4-20 mA loop read through an ADS1115 ADC.
//!
//! The loop current develops a voltage across a 250 Ω shunt (4-20 mA →
//! 1-5 V) which the ADS1115 samples on AIN0 in single-shot mode.
//!
//! ```text
//!  raw (i16) ──▶ V = raw/32767 · 4.096 ──▶ I = V / 0.250 kΩ ──▶ kg
//! ```
//!
//! Current below 4 mA (open loop, sensor fault) reads as exactly 0 kg.
//!
//! ## Dual-mode design
//!
//! [`LoopCurrentScale`] talks to any `embedded-hal` I2C bus.
//! [`SimulatedWeight`] is an accumulator driven only by `add` / `reset`.
//! [`WeightSensor`] picks one of them (or offline) once, at startup.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::app::ports::{SensorMode, SensorReading, WeightPort};
use crate::config::RigConfig;
use crate::error::HardwareFault;

/// ADS1115 conversion result register.
pub const REG_CONVERSION: u8 = 0x00;
/// ADS1115 configuration register.
pub const REG_CONFIG: u8 = 0x01;
/// Start single-shot, AIN0 vs GND, PGA ±4.096 V, 128 SPS, comparator off.
pub const CONFIG_AIN0_SINGLE_SHOT: u16 = 0xC183;

const ADC_POSITIVE_FULL_SCALE: f32 = 32767.0;

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Linear mapping from ADC counts to kilograms.
#[derive(Debug, Clone, Copy)]
pub struct LoopScaling {
    pub full_scale_v: f32,
    pub sense_resistor_ohms: f32,
    pub min_ma: f32,
    pub max_ma: f32,
    pub max_capacity_kg: f32,
}

impl LoopScaling {
    pub fn from_config(config: &RigConfig) -> Self {
        Self {
            full_scale_v: config.adc_full_scale_v,
            sense_resistor_ohms: config.sense_resistor_ohms,
            min_ma: config.loop_min_ma,
            max_ma: config.loop_max_ma,
            max_capacity_kg: config.max_capacity_kg,
        }
    }

    /// ADC counts to loop current in mA.
    pub fn raw_to_current_ma(&self, raw: i16) -> f32 {
        let voltage = (f32::from(raw) / ADC_POSITIVE_FULL_SCALE) * self.full_scale_v;
        voltage / (self.sense_resistor_ohms / 1000.0)
    }

    /// Loop current to weight, clamped to `[0, max_capacity_kg]`.
    pub fn current_to_kg(&self, current_ma: f32) -> f32 {
        if current_ma.is_nan() || current_ma < self.min_ma {
            return 0.0;
        }
        let fraction = (current_ma - self.min_ma) / (self.max_ma - self.min_ma);
        (fraction * self.max_capacity_kg).clamp(0.0, self.max_capacity_kg)
    }

    pub fn raw_to_kg(&self, raw: i16) -> f32 {
        self.current_to_kg(self.raw_to_current_ma(raw))
    }
}

// ---------------------------------------------------------------------------
// Hardware path
// ---------------------------------------------------------------------------

/// ADS1115-backed scale.  The bus and delay live behind their own mutex so
/// concurrent readers serialise on the bus, not on the rig.
pub struct LoopCurrentScale<I2C, D> {
    bus: Mutex<(I2C, D)>,
    address: u8,
    settle_ms: u32,
    scaling: LoopScaling,
}

impl<I2C: I2c, D: DelayNs> LoopCurrentScale<I2C, D> {
    pub fn new(i2c: I2C, delay: D, config: &RigConfig) -> Self {
        Self {
            bus: Mutex::new((i2c, delay)),
            address: config.adc_address,
            settle_ms: config.adc_settle_ms,
            scaling: LoopScaling::from_config(config),
        }
    }

    /// One full acquisition: trigger, settle, read back, convert.
    pub fn sample(&self) -> Result<f32, HardwareFault> {
        let mut guard = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        let (i2c, delay) = &mut *guard;

        let [hi, lo] = CONFIG_AIN0_SINGLE_SHOT.to_be_bytes();
        i2c.write(self.address, &[REG_CONFIG, hi, lo])
            .map_err(|e| bus_fault(&e))?;

        delay.delay_ms(self.settle_ms);

        let mut data = [0u8; 2];
        i2c.write_read(self.address, &[REG_CONVERSION], &mut data)
            .map_err(|e| bus_fault(&e))?;

        let raw = i16::from_be_bytes(data);
        Ok(self.scaling.raw_to_kg(raw))
    }
}

fn bus_fault(e: &impl embedded_hal::i2c::Error) -> HardwareFault {
    debug!("I2C error kind: {:?}", e.kind());
    HardwareFault::BusTransferFailed
}

impl<I2C, D> WeightPort for LoopCurrentScale<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn read_weight(&self) -> SensorReading {
        match self.sample() {
            Ok(kg) => SensorReading::new(kg, SensorMode::Hardware),
            Err(e) => {
                warn!("Weight read failed: {e}");
                SensorReading::new(0.0, SensorMode::Hardware)
            }
        }
    }

    fn mode(&self) -> SensorMode {
        SensorMode::Hardware
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Simulated scale.  The accumulator is an `f32` stored as bits in an
/// atomic, so `add` and `read` may race freely.
pub struct SimulatedWeight {
    bits: AtomicU32,
    max_kg: f32,
}

impl SimulatedWeight {
    pub fn new(max_kg: f32) -> Self {
        Self {
            bits: AtomicU32::new(0f32.to_bits()),
            max_kg,
        }
    }

    pub fn read(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Add `kg`, clamped to `[0, max_kg]`.  Returns the new value.
    pub fn add(&self, kg: f32) -> f32 {
        let max = self.max_kg;
        let step = |bits: u32| {
            let next = (f32::from_bits(bits) + kg).clamp(0.0, max);
            // NaN input leaves the accumulator untouched.
            (!next.is_nan()).then_some(next.to_bits())
        };
        let _ = self.bits.fetch_update(Ordering::AcqRel, Ordering::Acquire, step);
        self.read()
    }

    pub fn reset(&self) {
        self.bits.store(0f32.to_bits(), Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Selected source
// ---------------------------------------------------------------------------

/// The weight source chosen at startup.
pub enum WeightSensor {
    Hardware(Box<dyn WeightPort>),
    Simulated(SimulatedWeight),
    /// Hardware was wanted but the bus could not be opened.
    Offline,
}

impl WeightSensor {
    /// Choose the source once: simulation when requested, otherwise the
    /// hardware opened by `open`, otherwise offline.
    pub fn select(
        simulate: bool,
        config: &RigConfig,
        open: impl FnOnce() -> Result<Box<dyn WeightPort>, HardwareFault>,
    ) -> Self {
        if simulate {
            info!("Weight: simulated (max {} kg)", config.max_capacity_kg);
            return Self::Simulated(SimulatedWeight::new(config.max_capacity_kg));
        }
        match open() {
            Ok(port) => {
                info!("Weight: ADS1115 load cell attached");
                Self::Hardware(port)
            }
            Err(e) => {
                warn!("Weight: ADC unavailable ({e}), reading 0 kg");
                Self::Offline
            }
        }
    }
}

impl WeightPort for WeightSensor {
    fn read_weight(&self) -> SensorReading {
        match self {
            Self::Hardware(port) => port.read_weight(),
            Self::Simulated(sim) => SensorReading::new(sim.read(), SensorMode::Simulated),
            Self::Offline => SensorReading::new(0.0, SensorMode::Offline),
        }
    }

    fn simulate_add(&self, kg: f32) -> bool {
        match self {
            Self::Simulated(sim) => {
                let now = sim.add(kg);
                debug!("Simulated weight +{kg} kg -> {now} kg");
                true
            }
            _ => false,
        }
    }

    fn simulate_reset(&self) -> bool {
        match self {
            Self::Simulated(sim) => {
                sim.reset();
                true
            }
            _ => false,
        }
    }

    fn mode(&self) -> SensorMode {
        match self {
            Self::Hardware(port) => port.mode(),
            Self::Simulated(_) => SensorMode::Simulated,
            Self::Offline => SensorMode::Offline,
        }
    }
}
