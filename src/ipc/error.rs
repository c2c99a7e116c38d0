use serde_json::json;

use crate::timetable::TimetableError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn timetable_err(id: &str, e: &TimetableError) -> serde_json::Value {
    if let TimetableError::Persistence(source) = e {
        tracing::error!(request_id = %id, error = %source, "timetable storage failure");
    }
    err(id, e.code(), e.to_string(), e.details())
}
