//! Fill-process state record.
//!
//! [`ProcessState`] is only ever mutated through the transition methods
//! below, and only by the coordinator while it holds the rig lock.
//!
//! Wire names follow the operator UI: the phase is published as
//! `fill_mode`, and "no source" is `null`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RigConfig;
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Source / phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillSource {
    /// Pumped from the tank: pump + valve.
    Tank,
    /// Gravity-fed from the silo: damper.
    Silo,
}

impl FillSource {
    /// Interpret a requested source.  Only the literal `tank` selects the
    /// tank; every other value means silo.
    pub fn from_request(source: &str) -> Self {
        if source == "tank" { Self::Tank } else { Self::Silo }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Tank => "tank",
            Self::Silo => "silo",
        }
    }
}

impl fmt::Display for FillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPhase {
    #[default]
    Idle,
    /// High-rate fill towards the target.
    Coarse,
    /// Reserved for dosing the last few kilograms.
    Fine,
}

impl FromStr for FillPhase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "coarse" => Ok(Self::Coarse),
            "fine" => Ok(Self::Fine),
            other => Err(ValidationError::UnknownPhase(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub filling: bool,
    pub fill_source: Option<FillSource>,
    #[serde(rename = "fill_mode")]
    pub fill_phase: FillPhase,
    pub tank_target: f64,
    pub silo_target: f64,
    pub tank_overrun: f64,
    pub silo_overrun: f64,
    pub tank_weight: f64,
    pub silo_weight: f64,
}

impl ProcessState {
    /// Idle state with the configured default targets and overruns.
    pub fn new(config: &RigConfig) -> Self {
        Self {
            filling: false,
            fill_source: None,
            fill_phase: FillPhase::Idle,
            tank_target: config.default_target_kg,
            silo_target: config.default_target_kg,
            tank_overrun: config.default_overrun_kg,
            silo_overrun: config.default_overrun_kg,
            tank_weight: 0.0,
            silo_weight: 0.0,
        }
    }

    pub fn begin_fill(&mut self, source: FillSource) {
        self.filling = true;
        self.fill_source = Some(source);
        self.fill_phase = FillPhase::Coarse;
    }

    /// Stop / emergency stop.  The last source stays visible.
    pub fn end_fill(&mut self) {
        self.filling = false;
        self.fill_phase = FillPhase::Idle;
    }

    pub fn reset(&mut self) {
        self.end_fill();
        self.fill_source = None;
        self.tank_weight = 0.0;
        self.silo_weight = 0.0;
    }

    /// Move between fill phases.  Non-idle phases require a running fill.
    pub fn set_phase(&mut self, phase: FillPhase) -> Result<(), ValidationError> {
        if phase != FillPhase::Idle && !self.filling {
            return Err(ValidationError::NotFilling);
        }
        self.fill_phase = phase;
        if phase == FillPhase::Idle {
            self.filling = false;
        }
        Ok(())
    }

    pub fn apply_settings(&mut self, update: &SettingsUpdate) {
        if let Some(v) = update.tank_target {
            self.tank_target = v;
        }
        if let Some(v) = update.silo_target {
            self.silo_target = v;
        }
        if let Some(v) = update.tank_overrun {
            self.tank_overrun = v;
        }
        if let Some(v) = update.silo_overrun {
            self.silo_overrun = v;
        }
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new(&RigConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Settings update
// ---------------------------------------------------------------------------

/// A partial settings change.  `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsUpdate {
    pub tank_target: Option<f64>,
    pub silo_target: Option<f64>,
    pub tank_overrun: Option<f64>,
    pub silo_overrun: Option<f64>,
}

impl SettingsUpdate {
    /// Parse from a JSON object.  Numbers, numeric strings and booleans
    /// (as 1 or 0) are accepted; any other value rejects the whole update.
    /// Unknown keys are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let Some(map) = body.as_object() else {
            return Err(ValidationError::Malformed("settings must be an object".into()));
        };
        let field = |name: &'static str| -> Result<Option<f64>, ValidationError> {
            map.get(name).map(|v| coerce_number(name, v)).transpose()
        };
        Ok(Self {
            tank_target: field("tank_target")?,
            silo_target: field("silo_target")?,
            tank_overrun: field("tank_overrun")?,
            silo_overrun: field("silo_overrun")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn coerce_number(name: &'static str, value: &Value) -> Result<f64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or(ValidationError::NotANumber(name))
}
