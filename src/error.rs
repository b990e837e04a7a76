//! Unified error types for the fill controller.
//!
//! Two families matter to callers:
//!
//! - [`ValidationError`]: bad operator input (unknown relay, non-numeric
//!   setting, malformed request).  Returned synchronously, never fatal.
//! - [`HardwareFault`]: a pin, bus or probe operation failed.  Produced at
//!   the point of hardware access and collapsed to a safe default by the
//!   component that owns the peripheral; it never reaches the command API.
//!
//! All variants are `Copy` or cheaply `Clone` so they can be logged and
//! returned without ceremony.

use core::fmt;

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Relay name is not one of pump / valve / damper.
    UnknownRelay(String),
    /// A settings field could not be coerced to a real number.
    NotANumber(&'static str),
    /// Fill phase name is not idle / coarse / fine.
    UnknownPhase(String),
    /// A non-idle phase was requested while no fill is running.
    NotFilling,
    /// Event name is not part of the event-stream protocol.
    UnknownEvent(String),
    /// Request body or message could not be parsed.
    Malformed(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRelay(name) => write!(f, "unknown relay '{name}'"),
            Self::NotANumber(field) => write!(f, "field '{field}' is not a number"),
            Self::UnknownPhase(name) => write!(f, "unknown fill phase '{name}'"),
            Self::NotFilling => write!(f, "no fill in progress"),
            Self::UnknownEvent(name) => write!(f, "unknown event '{name}'"),
            Self::Malformed(msg) => write!(f, "malformed request: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Hardware faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    /// GPIO chip or line could not be claimed.
    PinClaimFailed,
    /// GPIO level write failed.
    PinWriteFailed,
    /// I2C bus could not be opened.
    BusOpenFailed,
    /// I2C transaction failed.
    BusTransferFailed,
    /// 1-Wire device directory could not be scanned.
    ProbeScanFailed,
    /// Probe value file could not be read or parsed.
    ProbeReadFailed,
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinClaimFailed => write!(f, "GPIO claim failed"),
            Self::PinWriteFailed => write!(f, "GPIO write failed"),
            Self::BusOpenFailed => write!(f, "I2C bus open failed"),
            Self::BusTransferFailed => write!(f, "I2C transfer failed"),
            Self::ProbeScanFailed => write!(f, "1-Wire scan failed"),
            Self::ProbeReadFailed => write!(f, "temperature probe read failed"),
        }
    }
}

impl std::error::Error for HardwareFault {}
