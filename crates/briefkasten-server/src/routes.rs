// ── Request handlers ──
//
// Every POST body is taken as raw JSON so a missing or malformed field
// yields a message naming that field instead of a generic decode error.
// Identifiers are validated here and never reach storage or logs raw.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use briefkasten_api::models::{
    Ack, FlapPoll, LetterRecord, LettersResponse, ServiceStatus, UnlockPoll,
};
use briefkasten_core::{DeviceRegistry, LetterLog, MacAddress, SerialNumber};

use crate::error::ApiError;
use crate::state::AppState;

type Body = Result<Json<Value>, JsonRejection>;

/// Protocol version reported by `/status`; devices compare against it.
const SERVICE_VERSION: &str = "1.0.0";

// ── Body helpers ─────────────────────────────────────────────────────

fn json_body(body: Body) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|_| ApiError::validation("expected JSON"))
}

/// A present, non-empty string field.
fn text_field<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn serial_field(body: &Value) -> Result<SerialNumber, ApiError> {
    let raw = text_field(body, "serial_number")
        .ok_or_else(|| ApiError::validation("serial_number is required"))?;
    Ok(SerialNumber::parse(raw)?)
}

fn mac_field(body: &Value) -> Result<MacAddress, ApiError> {
    let raw = text_field(body, "mac_address")
        .ok_or_else(|| ApiError::validation("mac_address is required"))?;
    Ok(MacAddress::parse(raw)?)
}

/// Resolve `serial_number`, or failing that `mac_address`, to a device.
/// `Ok(None)` means a well-formed MAC that is not registered.
fn device_field(state: &AppState, body: &Value) -> Result<Option<SerialNumber>, ApiError> {
    if text_field(body, "serial_number").is_some() {
        return serial_field(body).map(Some);
    }
    if text_field(body, "mac_address").is_some() {
        let mac = mac_field(body)?;
        return Ok(state.store().serial_for_mac(&mac));
    }
    Err(ApiError::validation(
        "serial_number or mac_address is required",
    ))
}

fn ack(status: &str) -> Json<Ack> {
    Json(Ack {
        status: status.to_owned(),
    })
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET|POST /status`
pub async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok".into(),
        version: SERVICE_VERSION.into(),
        time: Utc::now(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    body: Body,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let body = json_body(body)?;
    let mac = mac_field(&body)?;
    let serial = serial_field(&body)?;

    state.store().register(&mac, &serial)?;
    info!(%mac, %serial, "device registered");
    Ok((StatusCode::CREATED, ack("registered")))
}

/// `POST /letters`. A MAC that is unregistered, or not a MAC at all,
/// has no letters.
pub async fn letters(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<LettersResponse>, ApiError> {
    let body = json_body(body)?;
    let raw = text_field(&body, "mac_address")
        .ok_or_else(|| ApiError::validation("mac_address is required"))?;

    let serial = match MacAddress::parse(raw) {
        Ok(mac) => state.store().serial_for_mac(&mac),
        Err(_) => {
            debug!("letters requested for a malformed MAC");
            None
        }
    };
    let letters = match serial {
        Some(serial) => state.store().list_letters(&serial)?,
        None => {
            debug!("letters requested for an unregistered device");
            Vec::new()
        }
    };
    Ok(Json(LettersResponse {
        letters: letters.into_iter().map(LetterRecord::from).collect(),
    }))
}

/// `POST /new_letter`. Missing `time` means now.
pub async fn new_letter(
    State(state): State<AppState>,
    body: Body,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let body = json_body(body)?;
    let serial = serial_field(&body)?;

    let time = match body.get("time") {
        None | Some(Value::Null) => Utc::now(),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ApiError::validation("time must be an RFC 3339 timestamp"))?,
        Some(_) => return Err(ApiError::validation("time must be an RFC 3339 timestamp")),
    };

    let letter = state.store().append_letter(&serial, time)?;
    info!(%serial, id = letter.id, "letter added");
    Ok((StatusCode::CREATED, ack("letter added")))
}

/// `POST /entriegeln`: request an unlock.
pub async fn request_unlock(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<Ack>, ApiError> {
    let body = json_body(body)?;
    let serial = device_field(&state, &body)?
        .ok_or_else(|| ApiError::NotFound("unknown device".into()))?;

    state.flags().request_unlock(&serial);
    info!(%serial, "unlock requested");
    Ok(ack("entriegeln set to true"))
}

/// `POST /frage_entriegeln`: consume a pending unlock.
pub async fn poll_unlock(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<UnlockPoll>, ApiError> {
    let body = json_body(body)?;
    let serial = serial_field(&body)?;

    let entriegeln = state.flags().poll_and_clear_unlock(&serial);
    if entriegeln {
        info!(%serial, "unlock delivered");
    }
    Ok(Json(UnlockPoll { entriegeln }))
}

/// `POST /open`
pub async fn flap_opened(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<Ack>, ApiError> {
    let serial = serial_field(&json_body(body)?)?;
    state.flags().set_flap_open(&serial, true);
    info!(%serial, "flap opened");
    Ok(ack("klappe opened"))
}

/// `POST /close`
pub async fn flap_closed(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<Ack>, ApiError> {
    let serial = serial_field(&json_body(body)?)?;
    state.flags().set_flap_open(&serial, false);
    info!(%serial, "flap closed");
    Ok(ack("klappe closed"))
}

/// `POST /frage_offen`. Unknown devices read as closed.
pub async fn flap_state(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<FlapPoll>, ApiError> {
    let body = json_body(body)?;
    let offen = device_field(&state, &body)?
        .is_some_and(|serial| state.flags().get_flap_open(&serial));
    Ok(Json(FlapPoll { offen }))
}
