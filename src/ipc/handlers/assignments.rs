use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::handlers::catalog::section_param;
use crate::ipc::helpers::{db_conn, opt_i64, opt_string, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{assignments, setup};
use chrono::Local;
use serde_json::json;

fn parse_subject_codes(req: &Request) -> Result<Vec<String>, serde_json::Value> {
    let Some(raw) = req.params.get("subjectCodes") else {
        return Err(err(&req.id, "bad_params", "missing subjectCodes", None));
    };
    let bad = || {
        err(
            &req.id,
            "bad_params",
            "subjectCodes must be array of strings",
            None,
        )
    };
    let arr = raw.as_array().ok_or_else(bad)?;
    let mut out: Vec<String> = Vec::with_capacity(arr.len());
    for item in arr {
        let s = item.as_str().ok_or_else(bad)?.trim().to_string();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    if out.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "subjectCodes must contain at least one code",
            None,
        ));
    }
    Ok(out)
}

fn handle_assignments_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let faculty_id = match required_i64(req, "facultyId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let codes = match parse_subject_codes(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section_id = match section_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let academic_year = match opt_string(req, "academicYear") {
        Ok(Some(y)) => y,
        Ok(None) => match setup::load(conn) {
            Ok(s) => s.academic_year_for(Local::now().date_naive()),
            Err(e) => return timetable_err(&req.id, &e),
        },
        Err(e) => return e,
    };

    match assignments::assign(conn, faculty_id, &codes, section_id, &academic_year) {
        Ok(assigned) => {
            let created = assigned.iter().filter(|a| a.created).count();
            tracing::info!(
                faculty_id,
                section_id = ?section_id,
                created,
                existing = assigned.len() - created,
                "faculty assigned to subjects"
            );
            ok(
                &req.id,
                json!({
                    "assignments": assigned,
                    "created": created,
                    "existing": assigned.len() - created
                }),
            )
        }
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "assignments": [] }));
    };
    let faculty_id = match opt_i64(req, "facultyId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section_id = match section_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match assignments::list(conn, faculty_id, section_id) {
        Ok(rows) => ok(&req.id, json!({ "assignments": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.assign" => Some(handle_assignments_assign(state, req)),
        "assignments.list" => Some(handle_assignments_list(state, req)),
        _ => None,
    }
}
