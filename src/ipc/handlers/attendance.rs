use serde_json::json;

use crate::attendance::AttendanceRecord;
use crate::ipc::error::ok;
use crate::ipc::helpers::opt_str;
use crate::ipc::types::{AppState, Request};

fn record_json(record: &AttendanceRecord) -> serde_json::Value {
    let mut row = json!({
        "classId": record.class_id,
        "tokenId": record.token_id,
        "issuedAt": record.issued_at,
        "scannedAt": record.scanned_at,
    });
    if let Some(geo) = &record.geo {
        row["geo"] = json!({ "latitude": geo.latitude, "longitude": geo.longitude });
    }
    row
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = match opt_str(&req.params, "classId") {
        Some(class_id) => state
            .attendance
            .for_class(&class_id)
            .map(record_json)
            .collect(),
        None => state.attendance.records().iter().map(record_json).collect(),
    };
    ok(&req.id, json!({ "count": rows.len(), "records": rows }))
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.attendance.clear();
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_list(state, req)),
        "attendance.clear" => Some(handle_clear(state, req)),
        _ => None,
    }
}
