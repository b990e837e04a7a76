//! REST-style request router.
//!
//! | Method | Path                            | Handler              |
//! |--------|---------------------------------|----------------------|
//! | GET    | `/api/status`                   | status               |
//! | POST   | `/api/relay/{name}/{action}`    | set_relay            |
//! | POST   | `/api/emergency-stop`           | emergency_stop       |
//! | POST   | `/api/settings`                 | update_settings      |
//! | POST   | `/api/start-fill/{source}`      | start_fill           |
//! | POST   | `/api/stop-fill`                | stop_fill            |
//! | POST   | `/api/reset`                    | reset                |
//! | POST   | `/api/fill-phase/{phase}`       | set_fill_phase       |
//!
//! Transport-neutral: the caller supplies method, path and an optional
//! JSON body and gets back a status code and a JSON body.

use serde::Serialize;
use serde_json::{Value, json};

use crate::app::service::Coordinator;
use crate::app::state::{FillPhase, FillSource, SettingsUpdate};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<ValidationError> for ApiResponse {
    fn from(e: ValidationError) -> Self {
        Self::error(400, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

impl Method {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("GET") {
            Some(Self::Get)
        } else if s.eq_ignore_ascii_case("POST") {
            Some(Self::Post)
        } else {
            None
        }
    }
}

/// Route one request.
pub fn handle_request(
    coordinator: &Coordinator,
    method: &str,
    path: &str,
    body: Option<&Value>,
) -> ApiResponse {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some(method) = Method::parse(method) else {
        return ApiResponse::error(405, format!("method '{method}' not allowed"));
    };

    match (method, segments.as_slice()) {
        (Method::Get, ["api", "status"]) => status(coordinator),
        (Method::Post, ["api", "relay", name, action]) => set_relay(coordinator, name, action),
        (Method::Post, ["api", "emergency-stop"]) => emergency_stop(coordinator),
        (Method::Post, ["api", "settings"]) => update_settings(coordinator, body),
        (Method::Post, ["api", "start-fill", source]) => start_fill(coordinator, source),
        (Method::Post, ["api", "stop-fill"]) => {
            coordinator.stop_fill();
            ApiResponse::ok(json!({ "success": true }))
        }
        (Method::Post, ["api", "reset"]) => {
            coordinator.reset();
            ApiResponse::ok(json!({ "success": true }))
        }
        (Method::Post, ["api", "fill-phase", phase]) => set_fill_phase(coordinator, phase),
        (_, segs) if is_known_route(segs) => ApiResponse::error(405, "method not allowed"),
        _ => ApiResponse::error(404, format!("no route for {path}")),
    }
}

fn is_known_route(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["api", "status"]
            | ["api", "relay", _, _]
            | ["api", "emergency-stop"]
            | ["api", "settings"]
            | ["api", "start-fill", _]
            | ["api", "stop-fill"]
            | ["api", "reset"]
            | ["api", "fill-phase", _]
    )
}

// ── Handlers ──────────────────────────────────────────────────

fn status(coordinator: &Coordinator) -> ApiResponse {
    match serde_json::to_value(coordinator.status()) {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => ApiResponse::error(500, e.to_string()),
    }
}

fn set_relay(coordinator: &Coordinator, name: &str, action: &str) -> ApiResponse {
    match coordinator.set_relay(name, action) {
        Ok((relay, on)) => ApiResponse::ok(json!({
            "success": true,
            "relay": relay,
            "state": on,
        })),
        Err(e) => e.into(),
    }
}

fn emergency_stop(coordinator: &Coordinator) -> ApiResponse {
    coordinator.emergency_stop();
    ApiResponse::ok(json!({
        "success": true,
        "message": "Emergency stop activated",
    }))
}

fn update_settings(coordinator: &Coordinator, body: Option<&Value>) -> ApiResponse {
    let Some(body) = body.filter(|b| !b.is_null()) else {
        return ValidationError::Malformed("settings body missing".into()).into();
    };
    match SettingsUpdate::from_json(body) {
        Ok(update) => {
            let state = coordinator.update_settings(&update);
            ApiResponse::ok(json!({ "success": true, "settings": state }))
        }
        Err(e) => e.into(),
    }
}

fn start_fill(coordinator: &Coordinator, source: &str) -> ApiResponse {
    let source = FillSource::from_request(source);
    coordinator.start_fill(source);
    ApiResponse::ok(json!({ "success": true, "source": source }))
}

fn set_fill_phase(coordinator: &Coordinator, phase: &str) -> ApiResponse {
    let result = phase
        .parse::<FillPhase>()
        .and_then(|phase| coordinator.set_fill_phase(phase).map(|()| phase));
    match result {
        Ok(phase) => ApiResponse::ok(json!({ "success": true, "fill_mode": phase })),
        Err(e) => e.into(),
    }
}
