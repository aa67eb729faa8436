
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use std::thread::sleep;
use std::time::Duration;
use test_support::{request_err, request_ok, spawn_sidecar};

fn tiny_frame_params() -> serde_json::Value {
    json!({
        "width": 2,
        "height": 2,
        "luma": STANDARD.encode([255u8; 4]),
    })
}

#[test]
fn camera_denied_is_terminal_until_stopped() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let started = request_ok(&mut stdin, &mut reader, "1", "scanner.start", json!({}));
    assert_eq!(started.get("state").and_then(|v| v.as_str()), Some("requesting"));

    let denied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "scanner.cameraDenied",
        json!({ "message": "NotAllowedError: Permission denied" }),
    );
    assert_eq!(
        denied.get("state").and_then(|v| v.as_str()),
        Some("permissionDenied")
    );
    assert_eq!(denied.get("tracksOpen").and_then(|v| v.as_bool()), Some(false));
    assert!(denied
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .contains("NotAllowedError"));

    // frames delivered after denial are dropped untouched
    let frame = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "scanner.frame",
        tiny_frame_params(),
    );
    assert_eq!(frame.get("decoded").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(frame.get("ignored").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        frame.get("state").and_then(|v| v.as_str()),
        Some("permissionDenied")
    );

    let stopped = request_ok(&mut stdin, &mut reader, "4", "scanner.stop", json!({}));
    assert_eq!(stopped.get("state").and_then(|v| v.as_str()), Some("idle"));
    assert_eq!(stopped.get("tracksOpen").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn stop_is_idempotent() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    // never started
    let stopped = request_ok(&mut stdin, &mut reader, "1", "scanner.stop", json!({}));
    assert_eq!(stopped.get("state").and_then(|v| v.as_str()), Some("idle"));
    let stopped = request_ok(&mut stdin, &mut reader, "2", "scanner.stop", json!({}));
    assert_eq!(stopped.get("state").and_then(|v| v.as_str()), Some("idle"));

    let _ = request_ok(&mut stdin, &mut reader, "3", "scanner.start", json!({}));
    let granted = request_ok(&mut stdin, &mut reader, "4", "scanner.cameraGranted", json!({}));
    assert_eq!(granted.get("tracksOpen").and_then(|v| v.as_bool()), Some(true));

    let stopped = request_ok(&mut stdin, &mut reader, "5", "scanner.stop", json!({}));
    assert_eq!(stopped.get("tracksOpen").and_then(|v| v.as_bool()), Some(false));
    let stopped = request_ok(&mut stdin, &mut reader, "6", "scanner.stop", json!({}));
    assert_eq!(stopped.get("state").and_then(|v| v.as_str()), Some("idle"));
    assert_eq!(stopped.get("tracksOpen").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn camera_outcomes_require_requesting_phase() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "scanner.cameraGranted",
        json!({}),
    );
    assert_eq!(code, "bad_state");

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "scanner.cameraDenied",
        json!({}),
    );
    assert_eq!(code, "bad_state");

    let _ = request_ok(&mut stdin, &mut reader, "3", "scanner.start", json!({}));
    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "scanner.cameraGranted",
        json!({ "facing": "sideways" }),
    );
    assert_eq!(code, "bad_params");
    assert!(message.contains("sideways"));
}

#[test]
fn restart_releases_previous_camera() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(&mut stdin, &mut reader, "1", "scanner.start", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "2", "scanner.cameraGranted", json!({}));

    let restarted = request_ok(&mut stdin, &mut reader, "3", "scanner.start", json!({}));
    assert_eq!(
        restarted.get("state").and_then(|v| v.as_str()),
        Some("requesting")
    );
    assert_eq!(
        restarted.get("tracksOpen").and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(restarted.get("commits").and_then(|v| v.as_u64()), Some(0));
}

#[test]
fn verifying_returns_to_idle_after_cooldown() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "issuer.generate",
        json!({
            "classId": "cs101",
            "geo": { "latitude": 12.97, "longitude": 77.59 }
        }),
    );
    let rendered = request_ok(&mut stdin, &mut reader, "2", "issuer.render", json!({}));

    let _ = request_ok(&mut stdin, &mut reader, "3", "scanner.start", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "4", "scanner.cameraGranted", json!({}));
    let decoded = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "scanner.frame",
        json!({
            "width": rendered.get("width").and_then(|v| v.as_u64()).expect("width"),
            "height": rendered.get("height").and_then(|v| v.as_u64()).expect("height"),
            "luma": rendered.get("luma").and_then(|v| v.as_str()).expect("luma"),
        }),
    );
    assert_eq!(decoded.get("state").and_then(|v| v.as_str()), Some("verifying"));

    let tick = request_ok(&mut stdin, &mut reader, "6", "scanner.tick", json!({}));
    assert_eq!(tick.get("state").and_then(|v| v.as_str()), Some("verifying"));

    sleep(Duration::from_millis(2200));

    let tick = request_ok(&mut stdin, &mut reader, "7", "scanner.tick", json!({}));
    assert_eq!(tick.get("state").and_then(|v| v.as_str()), Some("idle"));

    let listed = request_ok(&mut stdin, &mut reader, "8", "attendance.list", json!({}));
    assert_eq!(listed.get("count").and_then(|v| v.as_u64()), Some(1));
}
