use rusqlite::{params_from_iter, types::Value, Connection};
use serde::Serialize;

use super::lookup::batch_label;
use super::Day;

pub const FREE_LABEL: &str = "Free";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFilter {
    All,
    Section(i64),
    Faculty(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySlot {
    pub slot_id: String,
    pub day: u8,
    pub day_name: &'static str,
    pub period: u8,
    pub start_time: Option<String>,
    pub subject_code: Option<String>,
    pub subject_name: String,
    pub faculty_id: Option<i64>,
    pub faculty_name: Option<String>,
    pub section_id: i64,
    pub section_name: String,
    pub batch_id: i64,
    pub batch_label: String,
    pub room: Option<String>,
    pub kind: String,
    pub assignment_id: Option<String>,
}

fn display_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<DisplaySlot> {
    let raw_day: i64 = r.get(1)?;
    let day = Day::from_index(raw_day).ok_or(rusqlite::Error::IntegralValueOutOfRange(1, raw_day))?;
    let subject_name: Option<String> = r.get(5)?;
    let department: String = r.get(12)?;
    Ok(DisplaySlot {
        slot_id: r.get(0)?,
        day: day.index(),
        day_name: day.name(),
        period: r.get(2)?,
        start_time: r.get(3)?,
        subject_code: r.get(4)?,
        subject_name: subject_name.unwrap_or_else(|| FREE_LABEL.to_string()),
        faculty_id: r.get(6)?,
        faculty_name: r.get(7)?,
        section_id: r.get(8)?,
        section_name: r.get(9)?,
        batch_id: r.get(10)?,
        room: r.get(11)?,
        batch_label: batch_label(&department, r.get(13)?, r.get(14)?),
        kind: r.get(15)?,
        assignment_id: r.get(16)?,
    })
}

/// Read-only join of stored slots with catalog data, one entry per occupied
/// cell, ordered by day, period, batch and section.
pub fn project(conn: &Connection, filter: ScheduleFilter) -> rusqlite::Result<Vec<DisplaySlot>> {
    let mut sql = String::from(
        "SELECT s.id, s.day, s.period, s.start_time,
                subj.code, subj.name, f.id, f.name,
                sec.id, sec.name, b.id, s.room,
                b.department, b.start_year, b.end_year, s.kind, a.id
         FROM timetable_slots s
         JOIN sections sec ON sec.id = s.section_id
         JOIN batches b ON b.id = sec.batch_id
         LEFT JOIN teaching_assignments a ON a.id = s.assignment_id
         LEFT JOIN subjects subj ON subj.id = a.subject_id
         LEFT JOIN faculty f ON f.id = a.faculty_id",
    );
    let mut bind: Vec<Value> = Vec::new();
    match filter {
        ScheduleFilter::All => {}
        ScheduleFilter::Section(id) => {
            sql.push_str(" WHERE s.section_id = ?");
            bind.push(Value::Integer(id));
        }
        ScheduleFilter::Faculty(id) => {
            sql.push_str(" WHERE a.faculty_id = ?");
            bind.push(Value::Integer(id));
        }
    }
    sql.push_str(
        " ORDER BY s.day, s.period, b.department, b.start_year, sec.name, s.section_id",
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), display_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
