//! Hardware adapter: acquires the real peripherals for the drivers.
//!
//! This is the only module that opens device files.  With the `rpi`
//! feature it claims the relay lines on the GPIO character device and
//! opens the I2C bus through `linux-embedded-hal`.  Without it every
//! acquisition fails, and callers fall back to their degraded modes.

use std::path::Path;

use log::info;

use crate::app::ports::WeightPort;
use crate::config::{HARDWARE_SUPPORT, RigConfig, SimulationFlags};
use crate::drivers::relay::{RelayBank, RelayPins};
use crate::error::HardwareFault;
use crate::sensors::SensorSet;

pub fn gpio_chip_path(config: &RigConfig) -> String {
    format!("/dev/gpiochip{}", config.gpio_chip)
}

pub fn i2c_bus_path(config: &RigConfig) -> String {
    format!("/dev/i2c-{}", config.i2c_bus)
}

/// True when this build has hardware support and the GPIO chip exists.
pub fn on_target_board(config: &RigConfig) -> bool {
    HARDWARE_SUPPORT && Path::new(&gpio_chip_path(config)).exists()
}

/// Relay bank for this run: logical-only when relays are simulated,
/// otherwise attached to the claimed lines (or detached if that fails).
pub fn relay_bank(flags: SimulationFlags, config: &RigConfig) -> RelayBank {
    if flags.relays_simulated() {
        info!("Relays: simulated (logical state only)");
        return RelayBank::detached();
    }
    RelayBank::attach_or_detached(open_relay_pins(config))
}

/// Sensors for this run.  The ADC is opened only when weight is not
/// simulated.
pub fn sensors(flags: SimulationFlags, config: &RigConfig) -> SensorSet {
    SensorSet::select(flags, config, on_target_board(config), || open_scale(config))
}

// ---------------------------------------------------------------------------
// Raspberry Pi (linux-embedded-hal)
// ---------------------------------------------------------------------------

#[cfg(feature = "rpi")]
const CONSUMER: &str = "ibcfill";

/// Claim the three relay lines as outputs, initially HIGH (off).
#[cfg(feature = "rpi")]
pub fn open_relay_pins(config: &RigConfig) -> Result<RelayPins, HardwareFault> {
    use crate::drivers::relay::RelayPin;
    use linux_embedded_hal::CdevPin;
    use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
    use log::error;

    let path = gpio_chip_path(config);
    let mut chip = Chip::new(&path).map_err(|e| {
        error!("GPIO: cannot open {path}: {e}");
        HardwareFault::PinClaimFailed
    })?;

    let mut claim = |offset: u32| -> Result<Box<dyn RelayPin>, HardwareFault> {
        let handle = chip
            .get_line(offset)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, 1, CONSUMER))
            .map_err(|e| {
                error!("GPIO{offset}: claim failed: {e}");
                HardwareFault::PinClaimFailed
            })?;
        let pin = CdevPin::new(handle).map_err(|e| {
            error!("GPIO{offset}: {e}");
            HardwareFault::PinClaimFailed
        })?;
        Ok(Box::new(pin))
    };

    Ok(RelayPins {
        pump: claim(config.relay_pump_gpio)?,
        valve: claim(config.relay_valve_gpio)?,
        damper: claim(config.relay_damper_gpio)?,
    })
}

/// Open the I2C bus and wrap it as the ADS1115 load cell.
#[cfg(feature = "rpi")]
pub fn open_scale(config: &RigConfig) -> Result<Box<dyn WeightPort>, HardwareFault> {
    use linux_embedded_hal::{Delay, I2cdev};
    use log::error;

    use crate::sensors::weight::LoopCurrentScale;

    let path = i2c_bus_path(config);
    let bus = I2cdev::new(&path).map_err(|e| {
        error!("I2C: cannot open {path}: {e}");
        HardwareFault::BusOpenFailed
    })?;
    Ok(Box::new(LoopCurrentScale::new(bus, Delay, config)))
}

// ---------------------------------------------------------------------------
// Builds without hardware support
// ---------------------------------------------------------------------------

#[cfg(not(feature = "rpi"))]
pub fn open_relay_pins(_config: &RigConfig) -> Result<RelayPins, HardwareFault> {
    Err(HardwareFault::PinClaimFailed)
}

#[cfg(not(feature = "rpi"))]
pub fn open_scale(_config: &RigConfig) -> Result<Box<dyn WeightPort>, HardwareFault> {
    Err(HardwareFault::BusOpenFailed)
}
