use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

use super::lookup::batch_label;
use super::Day;

/// The (batch, section) a faculty member is already committed to at some (day, period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingSection {
    pub faculty_id: i64,
    pub day: u8,
    pub day_name: &'static str,
    pub period: u8,
    pub section_id: i64,
    pub section_name: String,
    pub batch_id: i64,
    pub batch_label: String,
}

const OCCUPANCY_SQL: &str = "SELECT a.faculty_id, s.section_id, sec.name, b.id, b.department, b.start_year, b.end_year
     FROM timetable_slots s
     JOIN teaching_assignments a ON a.id = s.assignment_id
     JOIN sections sec ON sec.id = s.section_id
     JOIN batches b ON b.id = sec.batch_id";

fn occupancy_row(
    row: &rusqlite::Row<'_>,
    day: Day,
    period: u8,
) -> rusqlite::Result<ConflictingSection> {
    let department: String = row.get(4)?;
    Ok(ConflictingSection {
        faculty_id: row.get(0)?,
        day: day.index(),
        day_name: day.name(),
        period,
        section_id: row.get(1)?,
        section_name: row.get(2)?,
        batch_id: row.get(3)?,
        batch_label: batch_label(&department, row.get(5)?, row.get(6)?),
    })
}

/// First slot (in storage order) at (day, period) whose assignment pins `faculty_id`
/// to a section other than `excluding_section_id`.
///
/// Only slot-referenced assignments count; a general assignment never conflicts.
pub fn find_conflict(
    conn: &Connection,
    faculty_id: i64,
    day: Day,
    period: u8,
    excluding_section_id: i64,
) -> rusqlite::Result<Option<ConflictingSection>> {
    let sql = format!(
        "{OCCUPANCY_SQL}
         WHERE s.day = ? AND s.period = ? AND a.faculty_id = ? AND s.section_id <> ?
         ORDER BY s.rowid
         LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![
        day.index(),
        period,
        faculty_id,
        excluding_section_id
    ])?;
    match rows.next()? {
        Some(row) => Ok(Some(occupancy_row(row, day, period)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyAvailability {
    pub faculty_id: i64,
    pub name: String,
    pub department: Option<String>,
    pub free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_with: Option<ConflictingSection>,
}

/// Every faculty member with their commitment at (day, period), if any.
pub fn faculty_availability(
    conn: &Connection,
    day: Day,
    period: u8,
) -> rusqlite::Result<Vec<FacultyAvailability>> {
    let sql = format!(
        "{OCCUPANCY_SQL}
         WHERE s.day = ? AND s.period = ?
         ORDER BY s.rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let occupied = stmt
        .query_map(params![day.index(), period], |row| {
            occupancy_row(row, day, period)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut busy: HashMap<i64, ConflictingSection> = HashMap::new();
    for c in occupied {
        busy.entry(c.faculty_id).or_insert(c);
    }

    let mut stmt = conn.prepare("SELECT id, name, department FROM faculty ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |r| {
            let faculty_id: i64 = r.get(0)?;
            let busy_with = busy.get(&faculty_id).cloned();
            Ok(FacultyAvailability {
                faculty_id,
                name: r.get(1)?,
                department: r.get(2)?,
                free: busy_with.is_none(),
                busy_with,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::test_fixtures::seeded_conn;

    fn place(conn: &Connection, slot: &str, section: i64, faculty: i64, day: Day, period: u8) {
        let assignment = format!("as-{}", slot);
        conn.execute(
            "INSERT INTO teaching_assignments(id, subject_id, faculty_id, section_id, academic_year)
             VALUES(?, 1, ?, ?, '2026-2027')",
            params![assignment, faculty, section],
        )
        .expect("assignment");
        conn.execute(
            "INSERT INTO timetable_slots(id, section_id, day, period, assignment_id, faculty_id, kind)
             VALUES(?, ?, ?, ?, ?, ?, 'theory')",
            params![slot, section, day.index(), period, assignment, faculty],
        )
        .expect("slot");
    }

    #[test]
    fn reports_other_section_at_same_time() {
        let conn = seeded_conn();
        place(&conn, "s1", 10, 7, Day::Monday, 3);

        let c = find_conflict(&conn, 7, Day::Monday, 3, 11)
            .expect("query")
            .expect("conflict");
        assert_eq!(c.section_id, 10);
        assert_eq!(c.section_name, "A");
        assert_eq!(c.batch_label, "CSE 2024-2028");
    }

    #[test]
    fn own_section_never_conflicts() {
        let conn = seeded_conn();
        place(&conn, "s1", 10, 7, Day::Monday, 3);
        assert!(find_conflict(&conn, 7, Day::Monday, 3, 10)
            .expect("query")
            .is_none());
    }

    #[test]
    fn other_times_and_faculty_are_ignored() {
        let conn = seeded_conn();
        place(&conn, "s1", 10, 7, Day::Monday, 3);
        assert!(find_conflict(&conn, 7, Day::Monday, 4, 11).expect("q").is_none());
        assert!(find_conflict(&conn, 7, Day::Tuesday, 3, 11).expect("q").is_none());
        assert!(find_conflict(&conn, 8, Day::Monday, 3, 11).expect("q").is_none());
    }

    #[test]
    fn general_assignments_do_not_block() {
        let conn = seeded_conn();
        conn.execute(
            "INSERT INTO teaching_assignments(id, subject_id, faculty_id, section_id, academic_year)
             VALUES('general', 1, 7, NULL, '2026-2027')",
            [],
        )
        .expect("general");
        assert!(find_conflict(&conn, 7, Day::Monday, 3, 11).expect("q").is_none());
    }

    #[test]
    fn availability_marks_busy_faculty() {
        let conn = seeded_conn();
        place(&conn, "s1", 12, 9, Day::Friday, 1);

        let rows = faculty_availability(&conn, Day::Friday, 1).expect("availability");
        assert_eq!(rows.len(), 3);
        let menon = rows.iter().find(|r| r.faculty_id == 9).expect("menon");
        assert!(!menon.free);
        assert_eq!(menon.busy_with.as_ref().map(|c| c.section_id), Some(12));
        assert!(rows.iter().filter(|r| r.faculty_id != 9).all(|r| r.free));
    }
}
