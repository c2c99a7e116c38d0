use rusqlite::{params, Connection, OptionalExtension};

use super::TimetableError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLabel {
    pub section_name: String,
    pub batch_label: String,
}

pub fn batch_label(department: &str, start_year: i64, end_year: i64) -> String {
    format!("{} {}-{}", department, start_year, end_year)
}

pub fn section_label(conn: &Connection, section_id: i64) -> Result<SectionLabel, TimetableError> {
    conn.query_row(
        "SELECT s.name, b.department, b.start_year, b.end_year
         FROM sections s
         JOIN batches b ON b.id = s.batch_id
         WHERE s.id = ?",
        [section_id],
        |r| {
            let department: String = r.get(1)?;
            Ok(SectionLabel {
                section_name: r.get(0)?,
                batch_label: batch_label(&department, r.get(2)?, r.get(3)?),
            })
        },
    )
    .optional()?
    .ok_or_else(|| TimetableError::not_found("section", section_id))
}

pub fn section_id_by_name(
    conn: &Connection,
    batch_id: i64,
    name: &str,
) -> Result<i64, TimetableError> {
    conn.query_row(
        "SELECT id FROM sections WHERE batch_id = ? AND name = ?",
        params![batch_id, name.trim()],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| TimetableError::not_found("section", format!("{}/{}", batch_id, name.trim())))
}

pub fn faculty_name(conn: &Connection, faculty_id: i64) -> Result<String, TimetableError> {
    conn.query_row("SELECT name FROM faculty WHERE id = ?", [faculty_id], |r| {
        r.get(0)
    })
    .optional()?
    .ok_or_else(|| TimetableError::not_found("faculty", faculty_id))
}

pub fn subject_id_by_code(conn: &Connection, code: &str) -> Result<i64, TimetableError> {
    let code = code.trim();
    conn.query_row("SELECT id FROM subjects WHERE code = ?", [code], |r| r.get(0))
        .optional()?
        .ok_or_else(|| TimetableError::not_found("subject", code))
}
