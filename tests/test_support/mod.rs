#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}-{}",
        prefix,
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn send(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    payload: serde_json::Value,
) -> serde_json::Value {
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", payload);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    send(
        stdin,
        reader,
        id,
        json!({ "id": id, "method": method, "params": params }),
    )
}

/// Same as [`request`], with a `caller` identity on the envelope.
pub fn request_as(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    role: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    send(
        stdin,
        reader,
        id,
        json!({
            "id": id,
            "method": method,
            "params": params,
            "caller": { "id": format!("{}-user", role), "role": role }
        }),
    )
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

/// Ids created by [`seed_catalog`].
pub struct Catalog {
    pub cse_2024: i64,
    pub ece_2025: i64,
    pub cse_a: i64,
    pub cse_b: i64,
    pub ece_a: i64,
}

/// Two batches, three sections, faculty 7/8/9 and subjects CS101/CS102/EC201.
pub fn seed_catalog(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Catalog {
    let cse = request_ok(
        stdin,
        reader,
        "seed-b1",
        "batches.create",
        json!({ "department": "CSE", "startYear": 2024, "endYear": 2028, "currentSemester": 5 }),
    );
    let ece = request_ok(
        stdin,
        reader,
        "seed-b2",
        "batches.create",
        json!({ "department": "ECE", "startYear": 2025, "endYear": 2029 }),
    );
    let cse_2024 = cse["batchId"].as_i64().expect("cse batch id");
    let ece_2025 = ece["batchId"].as_i64().expect("ece batch id");

    for (id, name, dept) in [
        (7, "Dr. Rao", "CSE"),
        (8, "Dr. Iyer", "CSE"),
        (9, "Prof. Menon", "ECE"),
    ] {
        request_ok(
            stdin,
            reader,
            &format!("seed-f{}", id),
            "faculty.create",
            json!({ "id": id, "name": name, "department": dept }),
        );
    }

    let mut section = |batch: i64, name: &str| -> i64 {
        let res = request_ok(
            stdin,
            reader,
            &format!("seed-s{}-{}", batch, name),
            "sections.create",
            json!({ "batchId": batch, "name": name }),
        );
        res["sectionId"].as_i64().expect("section id")
    };
    let cse_a = section(cse_2024, "A");
    let cse_b = section(cse_2024, "B");
    let ece_a = section(ece_2025, "A");

    for (code, name, kind) in [
        ("CS101", "Programming in C", "theory"),
        ("CS102", "Data Structures Lab", "lab"),
        ("EC201", "Signals and Systems", "theory"),
    ] {
        request_ok(
            stdin,
            reader,
            &format!("seed-{}", code),
            "subjects.create",
            json!({ "code": code, "name": name, "credits": 4, "kind": kind }),
        );
    }

    Catalog {
        cse_2024,
        ece_2025,
        cse_a,
        cse_b,
        ece_a,
    }
}

pub fn select_fresh_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> PathBuf {
    let workspace = temp_dir(prefix);
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    workspace
}
