use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{opt_bool, opt_str, require_str, require_usize};
use crate::ipc::types::{AppState, Request};
use crate::qr::RasterBuffer;
use crate::scanner::{CameraFacing, FrameOutcome};

fn session_json(state: &AppState) -> Value {
    let mut result = json!({
        "state": state.scanner.phase().as_str(),
        "tracksOpen": state.scanner.tracks_open(),
        "commits": state.scanner.commits(),
    });
    if let Some(facing) = state.scanner.facing() {
        result["facing"] = json!(facing.as_str());
    }
    if let Some(message) = state.scanner.denial() {
        result["message"] = json!(message);
    }
    result
}

fn camera_granted(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let facing = match opt_str(params, "facing") {
        Some(raw) => CameraFacing::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown facing: {}", raw)))?,
        None => CameraFacing::default(),
    };
    state
        .scanner
        .camera_granted(facing)
        .map_err(|e| HandlerErr::bad_state(e.to_string()))?;
    Ok(session_json(state))
}

fn camera_denied(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let message =
        opt_str(params, "message").unwrap_or_else(|| "camera unavailable".to_string());
    state
        .scanner
        .camera_denied(message)
        .map_err(|e| HandlerErr::bad_state(e.to_string()))?;
    Ok(session_json(state))
}

fn frame(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let width = require_usize(params, "width")?;
    let height = require_usize(params, "height")?;
    let luma_b64 = require_str(params, "luma")?;
    let ready = opt_bool(params, "ready")?.unwrap_or(true);
    let luma = STANDARD
        .decode(luma_b64.as_bytes())
        .map_err(|e| HandlerErr::bad_params(format!("luma is not valid base64: {}", e)))?;
    let raster =
        RasterBuffer::new(width, height, luma).map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let now = Utc::now();
    let outcome = state.scanner.on_frame(&raster, ready, &state.decoder, now);
    let mut result = match outcome {
        FrameOutcome::Decoded(payload) => {
            let record = state.attendance.commit(&payload, now);
            json!({
                "decoded": true,
                "committed": true,
                "classId": record.class_id,
                "tokenId": record.token_id,
                "scannedAt": record.scanned_at,
            })
        }
        FrameOutcome::NoMatch => json!({ "decoded": false }),
        FrameOutcome::Skipped => json!({ "decoded": false, "skipped": true }),
        FrameOutcome::Ignored => json!({ "decoded": false, "ignored": true }),
    };
    result["state"] = json!(state.scanner.phase().as_str());
    Ok(result)
}

fn handle_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.scanner.start();
    ok(&req.id, session_json(state))
}

fn handle_camera_granted(state: &mut AppState, req: &Request) -> serde_json::Value {
    match camera_granted(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_camera_denied(state: &mut AppState, req: &Request) -> serde_json::Value {
    match camera_denied(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_frame(state: &mut AppState, req: &Request) -> serde_json::Value {
    match frame(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_tick(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.scanner.tick(Utc::now());
    ok(&req.id, session_json(state))
}

fn handle_stop(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.scanner.stop();
    ok(&req.id, session_json(state))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, session_json(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scanner.start" => Some(handle_start(state, req)),
        "scanner.cameraGranted" => Some(handle_camera_granted(state, req)),
        "scanner.cameraDenied" => Some(handle_camera_denied(state, req)),
        "scanner.frame" => Some(handle_frame(state, req)),
        "scanner.tick" => Some(handle_tick(state, req)),
        "scanner.stop" => Some(handle_stop(state, req)),
        "scanner.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
