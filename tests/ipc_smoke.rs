
use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{request_err, request_ok, spawn_sidecar};

#[test]
fn health_reports_version_and_phases() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(!health
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .is_empty());
    assert_eq!(health.get("issuer").and_then(|v| v.as_str()), Some("idle"));
    assert_eq!(health.get("scanner").and_then(|v| v.as_str()), Some("idle"));
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let (code, message) = request_err(&mut stdin, &mut reader, "1", "issuer.selfDestruct", json!({}));
    assert_eq!(code, "not_implemented");
    assert!(message.contains("issuer.selfDestruct"));
}

#[test]
fn malformed_line_reports_bad_json() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "this is not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_json")
    );

    // the loop keeps serving after a bad line
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health.get("issuer").and_then(|v| v.as_str()), Some("idle"));
}
