//! HTTP handlers: `/notify`, `/pai` and `/health`.
//!
//! Bodies arrive as raw JSON values so field-type errors map to the
//! daemon's own 400 shape rather than the extractor's. Validation failures
//! answer synchronously; accepted requests enqueue and answer 200 without
//! waiting for playback.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
};
use herald_types::{TtsEngine, VoiceOverrides};
use herald_voice::{probe, SpeakRequest};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::{notify, sanitize, AppState};

const DEFAULT_TITLE: &str = "PAI Notification";
const DEFAULT_MESSAGE: &str = "Task completed";

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": message.into()})),
    )
}

fn success() -> Json<Value> {
    Json(json!({"status": "success", "message": "Notification sent"}))
}

/// An optional string field; any other JSON type is a validation error.
fn string_field<'a>(body: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, String> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(format!("Invalid {key}")),
    }
}

fn bool_field(body: &Map<String, Value>, key: &str, default: bool) -> Result<bool, String> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("Invalid {key}")),
    }
}

struct Notification {
    title: String,
    message: String,
    voice_enabled: bool,
    request: SpeakRequest,
}

fn parse_notification(body: &Value, voice_fields: bool) -> Result<Notification, String> {
    let Some(body) = body.as_object() else {
        return Err("Invalid request body".to_string());
    };

    let title_raw = string_field(body, "title")?.unwrap_or(DEFAULT_TITLE);
    let message_raw = string_field(body, "message")?.unwrap_or(DEFAULT_MESSAGE);
    let title = sanitize::validate_field("title", title_raw)?;
    let message = sanitize::validate_field("message", message_raw)?;

    let mut request = SpeakRequest {
        message: message.clone(),
        ..SpeakRequest::default()
    };
    let mut voice_enabled = true;

    if voice_fields {
        voice_enabled = bool_field(body, "voice_enabled", true)?;
        request.voice_id = string_field(body, "voice_id")?.map(str::to_string);
        request.voice_name = string_field(body, "voice_name")?.map(str::to_string);

        request.overrides = match body.get("voice_settings") {
            None | Some(Value::Null) => VoiceOverrides::default(),
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
                .map_err(|_| "Invalid voice_settings".to_string())?,
            Some(_) => return Err("Invalid voice_settings".to_string()),
        };

        request.volume = match body.get("volume") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => {
                let volume = n.as_f64().unwrap_or(-1.0);
                if !(0.0..=1.0).contains(&volume) {
                    return Err("Invalid volume".to_string());
                }
                Some(volume as f32)
            }
            Some(_) => return Err("Invalid volume".to_string()),
        };
    }

    Ok(Notification {
        title,
        message,
        voice_enabled,
        request,
    })
}

fn accept(state: &AppState, notification: Notification) -> Json<Value> {
    notify::send_desktop(notification.title, notification.message);
    if notification.voice_enabled {
        // Fire and forget: the completion belongs to the queue worker.
        let _ = state.queue.enqueue(notification.request);
    }
    success()
}

/// `POST /notify`, the primary endpoint.
pub async fn notify_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult {
    let notification = parse_notification(&body, true).map_err(bad_request)?;
    Ok(accept(&state, notification))
}

/// `POST /pai`, the `{title, message}` alias with voice defaults.
pub async fn pai_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult {
    let notification = parse_notification(&body, false).map_err(bad_request)?;
    Ok(accept(&state, notification))
}

/// `GET /health`. Never fails.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let local_engine = state
        .engine
        .filter(|e| *e != TtsEngine::ElevenLabs)
        .map(|e| e.name())
        .or_else(|| state.config.preferred_engine.map(|e| e.name()));

    Json(json!({
        "status": "healthy",
        "port": state.config.port,
        "voice_system": state
            .engine
            .map(|e| e.description())
            .unwrap_or("none available"),
        "selected_local_engine": local_engine,
        "elevenlabs_configured":
            probe::elevenlabs_configured(state.config.elevenlabs_api_key.as_deref()),
        "default_voice_id": state.config.default_voice_id,
        "platform": std::env::consts::OS,
    }))
}
