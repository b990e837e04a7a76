//! Relay board driver (Waveshare 8-channel, direct GPIO).
//!
//! Three channels are used: CH1 pump, CH2 valve, CH3 damper.  The board is
//! **active LOW**: a LOW level energises the coil, HIGH releases it.
//!
//! ## Safety contract
//!
//! - Every pin is driven to the off level the moment it is attached, before
//!   the bank accepts any command.
//! - [`RelayBank::all_off`] always completes the sweep; a failing pin is
//!   logged and the remaining channels are still switched off.
//! - Dropping an attached bank switches everything off before the pin
//!   handles are released.
//!
//! ## Dual-mode design
//!
//! With pins attached: logical state plus physical drive.
//! Without pins (simulation or failed attach): logical state only.  The
//! logical state is authoritative in both modes; a failed pin write is a
//! degraded-hardware condition, not a reason to roll the state back.

use core::fmt;
use core::str::FromStr;

use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{HardwareFault, ValidationError};

// ---------------------------------------------------------------------------
// Channel identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayId {
    Pump,
    Valve,
    Damper,
}

impl RelayId {
    pub const ALL: [RelayId; 3] = [RelayId::Pump, RelayId::Valve, RelayId::Damper];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pump => "pump",
            Self::Valve => "valve",
            Self::Damper => "damper",
        }
    }

    /// Board channel number printed on the relay card.
    pub const fn board_channel(self) -> u8 {
        match self {
            Self::Pump => 1,
            Self::Valve => 2,
            Self::Damper => 3,
        }
    }

    const fn index(self) -> usize {
        self.board_channel() as usize - 1
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RelayId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pump" => Ok(Self::Pump),
            "valve" => Ok(Self::Valve),
            "damper" => Ok(Self::Damper),
            other => Err(ValidationError::UnknownRelay(other.to_owned())),
        }
    }
}

/// Line level for a logical relay state on the active-low board.
/// Returns `true` (HIGH) for a released relay.
pub const fn level_high_for(energized: bool) -> bool {
    !energized
}

// ---------------------------------------------------------------------------
// Pin abstraction
// ---------------------------------------------------------------------------

/// A claimed output line that drives one relay input.
pub trait RelayPin: Send {
    /// Drive the line HIGH (`true`) or LOW (`false`).
    fn set_level(&mut self, high: bool) -> Result<(), HardwareFault>;
}

impl<P: OutputPin + Send> RelayPin for P {
    fn set_level(&mut self, high: bool) -> Result<(), HardwareFault> {
        let result = if high { self.set_high() } else { self.set_low() };
        result.map_err(|e| {
            debug!("GPIO error kind: {:?}", e.kind());
            HardwareFault::PinWriteFailed
        })
    }
}

/// The three claimed pins handed to [`RelayBank::attach`].
pub struct RelayPins {
    pub pump: Box<dyn RelayPin>,
    pub valve: Box<dyn RelayPin>,
    pub damper: Box<dyn RelayPin>,
}

// ---------------------------------------------------------------------------
// ActuatorChannel
// ---------------------------------------------------------------------------

pub struct ActuatorChannel {
    id: RelayId,
    energized: bool,
    pin: Option<Box<dyn RelayPin>>,
}

impl ActuatorChannel {
    fn new(id: RelayId) -> Self {
        Self {
            id,
            energized: false,
            pin: None,
        }
    }

    /// Update the logical state, then the pin (if any).  The logical state
    /// is kept even when the pin write fails.
    fn drive(&mut self, energized: bool) -> Result<(), HardwareFault> {
        self.energized = energized;
        match self.pin.as_mut() {
            Some(pin) => pin.set_level(level_high_for(energized)),
            None => Ok(()),
        }
    }

    pub fn has_pin(&self) -> bool {
        self.pin.is_some()
    }
}

// ---------------------------------------------------------------------------
// RelayStates
// ---------------------------------------------------------------------------

/// Logical state of every relay, keyed by function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStates {
    pub pump: bool,
    pub valve: bool,
    pub damper: bool,
}

impl RelayStates {
    pub fn get(&self, id: RelayId) -> bool {
        match id {
            RelayId::Pump => self.pump,
            RelayId::Valve => self.valve,
            RelayId::Damper => self.damper,
        }
    }

    pub fn any_on(&self) -> bool {
        self.pump || self.valve || self.damper
    }
}

// ---------------------------------------------------------------------------
// RelayBank
// ---------------------------------------------------------------------------

pub struct RelayBank {
    channels: [ActuatorChannel; 3],
}

impl RelayBank {
    /// A bank with no pins bound; logical state only.
    pub fn detached() -> Self {
        Self {
            channels: RelayId::ALL.map(ActuatorChannel::new),
        }
    }

    /// Bind claimed pins and drive every one of them to the off level.
    ///
    /// If any initial write fails the pins are released again and the bank
    /// comes up detached.
    pub fn attach(pins: RelayPins) -> Self {
        let mut bank = Self::detached();
        let RelayPins {
            pump,
            valve,
            damper,
        } = pins;
        bank.channels[RelayId::Pump.index()].pin = Some(pump);
        bank.channels[RelayId::Valve.index()].pin = Some(valve);
        bank.channels[RelayId::Damper.index()].pin = Some(damper);

        let mut init_failed = false;
        for ch in &mut bank.channels {
            if let Err(e) = ch.drive(false) {
                error!("Relay CH{} ({}): init to OFF failed: {e}", ch.id.board_channel(), ch.id);
                init_failed = true;
            }
        }

        if init_failed {
            warn!("Relay board init incomplete, continuing without GPIO");
            for ch in &mut bank.channels {
                ch.pin = None;
            }
        } else {
            info!("Relay board attached (3 channels, active LOW, all OFF)");
        }
        bank
    }

    /// Attach when pin acquisition succeeded, otherwise degrade to detached.
    pub fn attach_or_detached(pins: Result<RelayPins, HardwareFault>) -> Self {
        match pins {
            Ok(pins) => Self::attach(pins),
            Err(e) => {
                error!("Relay GPIO unavailable ({e}), relays are logical-only");
                Self::detached()
            }
        }
    }

    /// Switch one relay.
    pub fn set(&mut self, id: RelayId, energized: bool) {
        let ch = &mut self.channels[id.index()];
        if let Err(e) = ch.drive(energized) {
            error!("Relay CH{} ({}): {e}", id.board_channel(), id);
        }
        info!(
            "Relay CH{} ({}): {}",
            id.board_channel(),
            id,
            if energized { "ON" } else { "OFF" }
        );
    }

    /// Switch a relay addressed by its wire name.
    pub fn set_by_name(&mut self, name: &str, energized: bool) -> Result<RelayId, ValidationError> {
        let id = name.parse::<RelayId>()?;
        self.set(id, energized);
        Ok(id)
    }

    pub fn get(&self, id: RelayId) -> bool {
        self.channels[id.index()].energized
    }

    pub fn states(&self) -> RelayStates {
        RelayStates {
            pump: self.get(RelayId::Pump),
            valve: self.get(RelayId::Valve),
            damper: self.get(RelayId::Damper),
        }
    }

    /// Switch every relay off.  Never stops early.
    pub fn all_off(&mut self) {
        for ch in &mut self.channels {
            if let Err(e) = ch.drive(false) {
                error!("Relay CH{} ({}): all-off write failed: {e}", ch.id.board_channel(), ch.id);
            }
        }
        warn!("ALL RELAYS OFF");
    }

    /// True when the bank drives physical pins.
    pub fn is_attached(&self) -> bool {
        self.channels.iter().any(ActuatorChannel::has_pin)
    }

    /// Switch everything off, then drop the pin handles.  Afterwards the
    /// bank keeps working in logical-only mode.
    pub fn release(&mut self) {
        if !self.is_attached() {
            return;
        }
        self.all_off();
        for ch in &mut self.channels {
            ch.pin = None;
        }
        info!("Relay GPIO released");
    }
}

impl Drop for RelayBank {
    fn drop(&mut self) {
        self.release();
    }
}
