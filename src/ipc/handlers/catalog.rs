//! Reference data the timetable reads from. These are plain seed/list
//! commands; editing and deletion live with the owning directories.

use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::helpers::{db_conn, opt_i64, opt_string, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::lookup::{self, batch_label};
use crate::timetable::SessionKind;
use rusqlite::{params, OptionalExtension};
use serde_json::json;

fn insert_failed(req: &Request, table: &str, e: rusqlite::Error) -> serde_json::Value {
    let code = match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => "duplicate",
        _ => "db_insert_failed",
    };
    err(&req.id, code, e.to_string(), Some(json!({ "table": table })))
}

fn handle_batches_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let department = match required_str(req, "department") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_year = match required_i64(req, "startYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let end_year = match required_i64(req, "endYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if end_year <= start_year {
        return err(&req.id, "bad_params", "endYear must be after startYear", None);
    }
    let current_semester = match opt_i64(req, "currentSemester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester_start = match opt_string(req, "semesterStart") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester_end = match opt_string(req, "semesterEnd") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = conn.execute(
        "INSERT INTO batches(department, start_year, end_year, current_semester, semester_start, semester_end)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![department, start_year, end_year, current_semester, semester_start, semester_end],
    ) {
        return insert_failed(req, "batches", e);
    }
    let batch_id = conn.last_insert_rowid();
    ok(
        &req.id,
        json!({ "batchId": batch_id, "label": batch_label(&department, start_year, end_year) }),
    )
}

fn handle_batches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "batches": [] }));
    };
    let mut stmt = match conn.prepare(
        "SELECT
           b.id, b.department, b.start_year, b.end_year, b.current_semester,
           b.semester_start, b.semester_end,
           (SELECT COUNT(*) FROM sections s WHERE s.batch_id = b.id) AS section_count
         FROM batches b
         ORDER BY b.department, b.start_year",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let department: String = row.get(1)?;
            let start_year: i64 = row.get(2)?;
            let end_year: i64 = row.get(3)?;
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "department": department,
                "startYear": start_year,
                "endYear": end_year,
                "label": batch_label(&department, start_year, end_year),
                "currentSemester": row.get::<_, Option<i64>>(4)?,
                "semesterStart": row.get::<_, Option<String>>(5)?,
                "semesterEnd": row.get::<_, Option<String>>(6)?,
                "sectionCount": row.get::<_, i64>(7)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(batches) => ok(&req.id, json!({ "batches": batches })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_sections_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let batch_id = match required_i64(req, "batchId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let capacity = match opt_i64(req, "capacity") {
        Ok(Some(v)) if v > 0 => v,
        Ok(Some(_)) => return err(&req.id, "bad_params", "capacity must be > 0", None),
        Ok(None) => 60,
        Err(e) => return e,
    };
    let tutor_id = match opt_i64(req, "tutorId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let batch_exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM batches WHERE id = ?", [batch_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if batch_exists.is_none() {
        return err(&req.id, "not_found", "batch not found", None);
    }
    if let Some(tid) = tutor_id {
        if let Err(e) = lookup::faculty_name(conn, tid) {
            return timetable_err(&req.id, &e);
        }
    }

    if let Err(e) = conn.execute(
        "INSERT INTO sections(batch_id, name, capacity, tutor_id) VALUES(?, ?, ?, ?)",
        params![batch_id, name, capacity, tutor_id],
    ) {
        return insert_failed(req, "sections", e);
    }
    ok(&req.id, json!({ "sectionId": conn.last_insert_rowid(), "name": name }))
}

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sections": [] }));
    };
    let batch_id = match opt_i64(req, "batchId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT s.id, s.batch_id, s.name, s.capacity, s.tutor_id, f.name,
                b.department, b.start_year, b.end_year
         FROM sections s
         JOIN batches b ON b.id = s.batch_id
         LEFT JOIN faculty f ON f.id = s.tutor_id
         WHERE (?1 IS NULL OR s.batch_id = ?1)
         ORDER BY b.department, b.start_year, s.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([batch_id], |row| {
            let department: String = row.get(6)?;
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "batchId": row.get::<_, i64>(1)?,
                "name": row.get::<_, String>(2)?,
                "capacity": row.get::<_, i64>(3)?,
                "tutorId": row.get::<_, Option<i64>>(4)?,
                "tutorName": row.get::<_, Option<String>>(5)?,
                "batchLabel": batch_label(&department, row.get(7)?, row.get(8)?)
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(sections) => ok(&req.id, json!({ "sections": sections })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let credits = match opt_i64(req, "credits") {
        Ok(Some(v)) if v >= 0 => v,
        Ok(Some(_)) => return err(&req.id, "bad_params", "credits must be >= 0", None),
        Ok(None) => 0,
        Err(e) => return e,
    };
    let semester = match opt_i64(req, "semester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match opt_string(req, "kind") {
        Ok(None) => SessionKind::Theory,
        Ok(Some(raw)) => match SessionKind::parse(&raw) {
            Some(k) => k,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "kind must be one of: theory, lab, tutorial",
                    None,
                )
            }
        },
        Err(e) => return e,
    };

    if let Err(e) = conn.execute(
        "INSERT INTO subjects(code, name, credits, semester, kind) VALUES(?, ?, ?, ?, ?)",
        params![code, name, credits, semester, kind.as_str()],
    ) {
        return insert_failed(req, "subjects", e);
    }
    ok(
        &req.id,
        json!({ "subjectId": conn.last_insert_rowid(), "code": code }),
    )
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    let mut stmt = match conn.prepare(
        "SELECT id, code, name, credits, semester, kind FROM subjects ORDER BY code",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "code": row.get::<_, String>(1)?,
                "name": row.get::<_, String>(2)?,
                "credits": row.get::<_, i64>(3)?,
                "semester": row.get::<_, Option<i64>>(4)?,
                "kind": row.get::<_, String>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_faculty_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match opt_i64(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let department = match opt_string(req, "department") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match opt_string(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Directory ids come from the user store; fall back to a local rowid.
    if let Err(e) = conn.execute(
        "INSERT INTO faculty(id, name, department, email) VALUES(?, ?, ?, ?)",
        params![id, name, department, email],
    ) {
        return insert_failed(req, "faculty", e);
    }
    ok(
        &req.id,
        json!({ "facultyId": conn.last_insert_rowid(), "name": name }),
    )
}

fn handle_faculty_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "faculty": [] }));
    };
    let mut stmt = match conn.prepare(
        "SELECT id, name, department, email FROM faculty ORDER BY name, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "name": row.get::<_, String>(1)?,
                "department": row.get::<_, Option<String>>(2)?,
                "email": row.get::<_, Option<String>>(3)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(faculty) => ok(&req.id, json!({ "faculty": faculty })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Shared by handlers that accept either `sectionId` or `batchId` + `section` (name).
pub fn section_param(conn: &rusqlite::Connection, req: &Request) -> Result<Option<i64>, serde_json::Value> {
    if let Some(id) = opt_i64(req, "sectionId")? {
        return Ok(Some(id));
    }
    let batch_id = opt_i64(req, "batchId")?;
    let section = opt_string(req, "section")?;
    match (batch_id, section) {
        (Some(b), Some(name)) => lookup::section_id_by_name(conn, b, &name)
            .map(Some)
            .map_err(|e| timetable_err(&req.id, &e)),
        (None, None) => Ok(None),
        _ => Err(err(
            &req.id,
            "bad_params",
            "batchId and section must be supplied together",
            None,
        )),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "batches.create" => Some(handle_batches_create(state, req)),
        "batches.list" => Some(handle_batches_list(state, req)),
        "sections.create" => Some(handle_sections_create(state, req)),
        "sections.list" => Some(handle_sections_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "faculty.create" => Some(handle_faculty_create(state, req)),
        "faculty.list" => Some(handle_faculty_list(state, req)),
        _ => None,
    }
}
