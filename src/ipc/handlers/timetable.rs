use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::handlers::catalog::section_param;
use crate::ipc::helpers::{
    caller, db_conn, opt_i64, opt_string, request_now, required_day, required_period,
};
use crate::ipc::types::{AppState, Request};
use crate::timetable::conflicts;
use crate::timetable::policy;
use crate::timetable::projector::{self, ScheduleFilter};
use crate::timetable::setup;
use crate::timetable::stats;
use crate::timetable::upsert::{self, CellState, SlotEdit};
use crate::timetable::{parse_time, SessionKind};
use chrono::Local;
use rusqlite::Connection;
use serde_json::json;

fn schedule_filter(conn: &Connection, req: &Request) -> Result<ScheduleFilter, serde_json::Value> {
    let section_id = section_param(conn, req)?;
    let faculty_id = opt_i64(req, "facultyId")?;
    match (section_id, faculty_id) {
        (Some(_), Some(_)) => Err(err(
            &req.id,
            "bad_params",
            "pass either a section or facultyId, not both",
            None,
        )),
        (Some(s), None) => Ok(ScheduleFilter::Section(s)),
        (None, Some(f)) => Ok(ScheduleFilter::Faculty(f)),
        (None, None) => Ok(ScheduleFilter::All),
    }
}

fn handle_timetable_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter = match schedule_filter(conn, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let slots = match projector::project(conn, filter) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let version = match filter {
        ScheduleFilter::Section(sid) => match upsert::section_version(conn, sid) {
            Ok(v) => Some(v),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        _ => None,
    };
    ok(&req.id, json!({ "slots": slots, "version": version }))
}

fn parse_slot_edit(conn: &Connection, req: &Request) -> Result<SlotEdit, serde_json::Value> {
    let Some(section_id) = section_param(conn, req)? else {
        return Err(err(
            &req.id,
            "bad_params",
            "missing sectionId (or batchId + section)",
            None,
        ));
    };
    let day = required_day(req, "day")?;
    let period = required_period(req, "period")?;
    let subject_code = opt_string(req, "subjectCode")?;
    let faculty_id = opt_i64(req, "facultyId")?;
    let room = opt_string(req, "room")?;
    let kind = match opt_string(req, "kind")? {
        None => SessionKind::default(),
        Some(raw) => SessionKind::parse(&raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "kind must be one of: theory, lab, tutorial",
                None,
            )
        })?,
    };
    let start_time = match opt_string(req, "startTime")? {
        None => None,
        Some(raw) => Some(parse_time(&raw).ok_or_else(|| {
            err(&req.id, "bad_params", "startTime must be HH:MM", None)
        })?),
    };
    let expected_version = opt_i64(req, "expectedVersion")?;
    Ok(SlotEdit {
        section_id,
        day,
        period,
        subject_code,
        faculty_id,
        room,
        kind,
        start_time,
        expected_version,
    })
}

fn handle_timetable_save_slot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let who = match caller(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let setup = match setup::load(conn) {
        Ok(s) => s,
        Err(e) => return timetable_err(&req.id, &e),
    };
    if let Err(e) = policy::ensure_can_edit_slots(&setup, &who) {
        return timetable_err(&req.id, &e);
    }
    let edit = match parse_slot_edit(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match upsert::save_slot(conn, &setup, &edit, Local::now().date_naive()) {
        Ok(outcome) => {
            let mut result = json!({
                "sectionId": edit.section_id,
                "day": edit.day.name(),
                "period": edit.period,
                "version": outcome.version,
            });
            match outcome.cell {
                CellState::Empty => {
                    result["cell"] = json!("cleared");
                }
                CellState::Occupied {
                    slot_id,
                    assignment,
                } => {
                    result["cell"] = json!("occupied");
                    result["slotId"] = json!(slot_id);
                    result["assignmentId"] = json!(assignment.id());
                    result["assignment"] = json!(assignment.label());
                }
            }
            ok(&req.id, result)
        }
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_timetable_class_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter = match schedule_filter(conn, req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let now = match request_now(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::class_stats(conn, filter, now) {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_timetable_availability(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let day = match required_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let period = match required_period(req, "period") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conflicts::faculty_availability(conn, day, period) {
        Ok(faculty) => ok(
            &req.id,
            json!({ "day": day.name(), "period": period, "faculty": faculty }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.get" => Some(handle_timetable_get(state, req)),
        "timetable.saveSlot" => Some(handle_timetable_save_slot(state, req)),
        "timetable.classStats" => Some(handle_timetable_class_stats(state, req)),
        "timetable.availability" => Some(handle_timetable_availability(state, req)),
        _ => None,
    }
}
