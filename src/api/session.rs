//! Inbound message dispatch for one client connection.
//!
//! Each decoded line is either an event-stream message
//! `{"event": name, "data": {...}}` or a REST-style request
//! `{"method": m, "path": p, "body": {...}}`.  [`handle_line`] runs it
//! against the coordinator and returns the reply line, if any.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::app::commands::RigCommand;
use crate::app::events::RigEvent;
use crate::app::ports::SensorMode;
use crate::app::service::Coordinator;
use crate::error::ValidationError;

use super::rest::{ApiResponse, handle_request};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Event {
        event: String,
        #[serde(default)]
        data: Value,
    },
    Request {
        method: String,
        path: String,
        #[serde(default)]
        body: Option<Value>,
    },
}

impl Inbound {
    pub fn parse(line: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(line).map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

/// Run one event-stream command.  Validation failures become an `error`
/// event; `simulate_add_weight` produces no reply, and is dropped unread
/// when weight is not simulated.
pub fn handle_event(coordinator: &Coordinator, name: &str, data: &Value) -> Option<RigEvent> {
    if RigCommand::is_simulation_event(name) && coordinator.weight_mode() != SensorMode::Simulated {
        debug!("Event '{name}' ignored, weight is not simulated");
        return None;
    }
    match RigCommand::from_event(name, data) {
        Ok(cmd) => {
            debug!("Event '{name}' -> {cmd:?}");
            coordinator.handle_command(cmd)
        }
        Err(e) => {
            warn!("Event '{name}' rejected: {e}");
            Some(RigEvent::Error(e.to_string()))
        }
    }
}

/// Handle one inbound line and produce the JSON reply, if any.
pub fn handle_line(coordinator: &Coordinator, line: &str) -> Option<Value> {
    match Inbound::parse(line) {
        Ok(Inbound::Event { event, data }) => {
            handle_event(coordinator, &event, &data).map(|ack| ack.to_message())
        }
        Ok(Inbound::Request { method, path, body }) => {
            let response = handle_request(coordinator, &method, &path, body.as_ref());
            if response.is_success() {
                debug!("{method} {path} -> {}", response.status);
            } else {
                warn!("{method} {path} -> {}: {}", response.status, response.body);
            }
            serde_json::to_value(response).ok()
        }
        Err(e) => {
            warn!("Dropping line: {e}");
            serde_json::to_value(ApiResponse::from(e)).ok()
        }
    }
}
