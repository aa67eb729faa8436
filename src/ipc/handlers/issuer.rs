use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};

use crate::clock::format_countdown;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{opt_i64, opt_str, require_str};
use crate::ipc::types::{AppState, Request};
use crate::issuer::{IssuerPhase, IssuerStatus, ReportedFix};
use crate::qr;
use crate::token::{GeoPoint, DEFAULT_VALIDITY_SECONDS};

const MIN_VALIDITY_SECONDS: i64 = 1;
const MAX_VALIDITY_SECONDS: i64 = 600;
const DEFAULT_RENDER_SCALE: i64 = 4;
const MAX_RENDER_SCALE: i64 = 16;
const DEFAULT_QUIET_ZONE: i64 = 4;
const MAX_QUIET_ZONE: i64 = 16;

fn parse_geo(params: &Value) -> Result<Option<GeoPoint>, HandlerErr> {
    let Some(geo) = params.get("geo") else {
        return Ok(None);
    };
    if geo.is_null() {
        return Ok(None);
    }
    let latitude = geo.get("latitude").and_then(|v| v.as_f64());
    let longitude = geo.get("longitude").and_then(|v| v.as_f64());
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Some(GeoPoint {
            latitude,
            longitude,
        })),
        _ => Err(HandlerErr::bad_params(
            "geo requires numeric latitude and longitude",
        )),
    }
}

fn parse_validity(params: &Value) -> Result<i64, HandlerErr> {
    let validity = opt_i64(params, "validitySeconds")?.unwrap_or(DEFAULT_VALIDITY_SECONDS);
    if !(MIN_VALIDITY_SECONDS..=MAX_VALIDITY_SECONDS).contains(&validity) {
        return Err(HandlerErr::bad_params(format!(
            "validitySeconds must be between {} and {}",
            MIN_VALIDITY_SECONDS, MAX_VALIDITY_SECONDS
        )));
    }
    Ok(validity)
}

fn generate(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = require_str(params, "classId")?;
    let validity = parse_validity(params)?;
    let mut location = ReportedFix {
        fix: parse_geo(params)?,
        error: opt_str(params, "geoError"),
    };
    let minted = state
        .issuer
        .generate(&class_id, validity, &mut location, Utc::now())
        .map_err(|e| HandlerErr::new("location_unavailable", e.to_string()))?;
    Ok(json!({
        "classId": minted.payload.class_id,
        "tokenId": minted.payload.token_id,
        "issuedAt": minted.payload.issued_at,
        "validitySeconds": minted.validity_seconds,
        "code": minted.code,
        "countdown": format_countdown(minted.validity_seconds)
    }))
}

fn render(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let scale = opt_i64(params, "scale")?.unwrap_or(DEFAULT_RENDER_SCALE);
    if !(1..=MAX_RENDER_SCALE).contains(&scale) {
        return Err(HandlerErr::bad_params(format!(
            "scale must be between 1 and {}",
            MAX_RENDER_SCALE
        )));
    }
    let quiet_zone = opt_i64(params, "quietZone")?.unwrap_or(DEFAULT_QUIET_ZONE);
    if !(0..=MAX_QUIET_ZONE).contains(&quiet_zone) {
        return Err(HandlerErr::bad_params(format!(
            "quietZone must be between 0 and {}",
            MAX_QUIET_ZONE
        )));
    }
    if state.issuer.phase() != IssuerPhase::Active {
        return Err(HandlerErr::bad_state(format!(
            "issuer is {}, nothing to render",
            state.issuer.phase().as_str()
        )));
    }
    let Some(token) = state.issuer.token() else {
        return Err(HandlerErr::bad_state("no active token"));
    };
    let code = token.payload.encode();
    let ascii =
        qr::render_ascii(&code).map_err(|e| HandlerErr::new("render_failed", e.to_string()))?;
    let raster = qr::render_raster(&code, scale as usize, quiet_zone as usize)
        .map_err(|e| HandlerErr::new("render_failed", e.to_string()))?;
    Ok(json!({
        "code": code,
        "ascii": ascii,
        "width": raster.width(),
        "height": raster.height(),
        "luma": STANDARD.encode(raster.luma())
    }))
}

fn status_json(status: &IssuerStatus, include_notice: bool) -> Value {
    let mut result = json!({ "state": status.phase.as_str() });
    if let Some(class_id) = &status.class_id {
        result["classId"] = json!(class_id);
    }
    if let Some(token_id) = &status.token_id {
        result["tokenId"] = json!(token_id);
    }
    if let Some(validity) = status.validity_seconds {
        result["validitySeconds"] = json!(validity);
    }
    if let Some(remaining) = status.remaining_seconds {
        result["remaining"] = json!(remaining);
    }
    if let Some(countdown) = &status.countdown {
        result["countdown"] = json!(countdown);
    }
    if include_notice {
        result["expiredNotice"] = json!(status.expired_notice);
    }
    result
}

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    match generate(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, status_json(&state.issuer.status(Utc::now()), false))
}

fn handle_tick(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, status_json(&state.issuer.tick(Utc::now()), true))
}

fn handle_render(state: &mut AppState, req: &Request) -> serde_json::Value {
    match render(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.issuer.reset();
    ok(&req.id, json!({ "state": "idle" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "issuer.generate" => Some(handle_generate(state, req)),
        "issuer.status" => Some(handle_status(state, req)),
        "issuer.tick" => Some(handle_tick(state, req)),
        "issuer.render" => Some(handle_render(state, req)),
        "issuer.reset" => Some(handle_reset(state, req)),
        _ => None,
    }
}
