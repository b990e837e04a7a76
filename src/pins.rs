//! GPIO / bus assignments for the Raspberry Pi 5 fill controller.
//!
//! Single source of truth: drivers and the default [`RigConfig`] reference
//! these constants rather than hard-coding numbers.
//!
//! [`RigConfig`]: crate::config::RigConfig

// ---------------------------------------------------------------------------
// Relay board (Waveshare 8-ch, direct GPIO, active LOW)
// ---------------------------------------------------------------------------

/// GPIO character device index (`/dev/gpiochip0`).
pub const GPIO_CHIP: u32 = 0;
/// CH1: transfer pump (tank line).
pub const RELAY_PUMP_GPIO: u32 = 5;
/// CH2: tank valve.
pub const RELAY_VALVE_GPIO: u32 = 6;
/// CH3: silo damper.
pub const RELAY_DAMPER_GPIO: u32 = 13;

// ---------------------------------------------------------------------------
// Load cell ADC (ADS1115 on I2C-1)
// ---------------------------------------------------------------------------

/// I2C bus index (`/dev/i2c-1`).
pub const I2C_BUS: u32 = 1;
/// ADS1115 address with ADDR tied to GND.
pub const ADS1115_ADDR: u8 = 0x48;

// ---------------------------------------------------------------------------
// DS18B20 temperature probe (1-Wire, kernel w1-therm driver)
// ---------------------------------------------------------------------------

/// Sysfs directory where the kernel lists 1-Wire slaves.
pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices/";
/// DS18B20 family code prefix of the slave directory name.
pub const DS18B20_FAMILY_PREFIX: &str = "28";
