mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("timetabled-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].is_string());
    assert!(health["workspacePath"].is_null());

    // Everything that needs storage answers no_workspace until one is selected.
    for (i, method) in [
        "setup.get",
        "batches.create",
        "assignments.assign",
        "timetable.get",
        "timetable.availability",
    ]
    .iter()
    .enumerate()
    {
        let res = request(&mut stdin, &mut reader, &format!("pre-{}", i), method, json!({}));
        assert_eq!(error_code(&res), Some("no_workspace"), "{}: {}", method, res);
    }
    // List methods degrade to empty results instead.
    let empty = request_ok(&mut stdin, &mut reader, "pre-list", "faculty.list", json!({}));
    assert_eq!(empty["faculty"], json!([]));

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["workspacePath"], json!(workspace.to_string_lossy()));
    assert!(workspace.join("timetable.sqlite3").exists());

    for (i, method) in [
        "setup.get",
        "batches.list",
        "sections.list",
        "subjects.list",
        "faculty.list",
        "assignments.list",
        "timetable.get",
    ]
    .iter()
    .enumerate()
    {
        request_ok(&mut stdin, &mut reader, &format!("post-{}", i), method, json!({}));
    }

    let unknown = request(&mut stdin, &mut reader, "3", "timetable.explode", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    let missing_path = request(&mut stdin, &mut reader, "4", "workspace.select", json!({}));
    assert_eq!(error_code(&missing_path), Some("bad_params"));
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(error_code(&value), Some("bad_json"));

    // Blank lines are skipped without a reply.
    writeln!(stdin).expect("write blank");
    let health = request_ok(&mut stdin, &mut reader, "after", "health", json!({}));
    assert!(health["version"].is_string());
}
