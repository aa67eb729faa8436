
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar};

fn scan_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    class_id: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        "gen",
        "issuer.generate",
        json!({
            "classId": class_id,
            "geo": { "latitude": 12.97, "longitude": 77.59 }
        }),
    );
    let rendered = request_ok(stdin, reader, "render", "issuer.render", json!({}));

    let _ = request_ok(stdin, reader, "start", "scanner.start", json!({}));
    let _ = request_ok(stdin, reader, "grant", "scanner.cameraGranted", json!({}));
    let decoded = request_ok(
        stdin,
        reader,
        "frame",
        "scanner.frame",
        json!({
            "width": rendered.get("width").and_then(|v| v.as_u64()).expect("width"),
            "height": rendered.get("height").and_then(|v| v.as_u64()).expect("height"),
            "luma": rendered.get("luma").and_then(|v| v.as_str()).expect("luma"),
        }),
    );
    assert_eq!(decoded.get("committed").and_then(|v| v.as_bool()), Some(true));
    let _ = request_ok(stdin, reader, "stop", "scanner.stop", json!({}));
}

#[test]
fn list_filters_by_class_and_clears() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    scan_class(&mut stdin, &mut reader, "cs101");
    scan_class(&mut stdin, &mut reader, "ma201");

    let all = request_ok(&mut stdin, &mut reader, "1", "attendance.list", json!({}));
    assert_eq!(all.get("count").and_then(|v| v.as_u64()), Some(2));
    let classes: Vec<&str> = all
        .get("records")
        .and_then(|v| v.as_array())
        .expect("records")
        .iter()
        .filter_map(|r| r.get("classId").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(classes, ["cs101", "ma201"]);

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.list",
        json!({ "classId": "cs101" }),
    );
    assert_eq!(filtered.get("count").and_then(|v| v.as_u64()), Some(1));

    let cleared = request_ok(&mut stdin, &mut reader, "3", "attendance.clear", json!({}));
    assert_eq!(cleared.get("ok").and_then(|v| v.as_bool()), Some(true));

    let empty = request_ok(&mut stdin, &mut reader, "4", "attendance.list", json!({}));
    assert_eq!(empty.get("count").and_then(|v| v.as_u64()), Some(0));
}
