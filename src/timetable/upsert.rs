use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::assignments::{self, Resolution};
use super::conflicts;
use super::lookup;
use super::setup::TimetableSetup;
use super::{format_time, Day, SessionKind, TimetableError};

/// One requested cell edit. No subject and no faculty means "clear the cell".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEdit {
    pub section_id: i64,
    pub day: Day,
    pub period: u8,
    pub subject_code: Option<String>,
    pub faculty_id: Option<i64>,
    pub room: Option<String>,
    pub kind: SessionKind,
    pub start_time: Option<NaiveTime>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Occupied {
        slot_id: String,
        assignment: Resolution,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub cell: CellState,
    /// Section timetable version after this save.
    pub version: i64,
}

fn is_clear(edit: &SlotEdit) -> bool {
    edit.subject_code.is_none() && edit.faculty_id.is_none()
}

fn validate(setup: &TimetableSetup, edit: &SlotEdit) -> Result<(), TimetableError> {
    if edit.period == 0 {
        return Err(TimetableError::validation("period must be >= 1"));
    }
    // Cells left above a reduced periodsPerDay can still be cleared.
    if edit.period > setup.periods_per_day && !is_clear(edit) {
        return Err(TimetableError::validation(format!(
            "period must be in 1..={}",
            setup.periods_per_day
        )));
    }
    if edit
        .subject_code
        .as_deref()
        .is_some_and(|code| code.trim().is_empty())
    {
        return Err(TimetableError::validation("subjectCode must not be empty"));
    }
    Ok(())
}

pub fn section_version(conn: &Connection, section_id: i64) -> rusqlite::Result<i64> {
    Ok(conn
        .query_row(
            "SELECT version FROM timetable_versions WHERE section_id = ?",
            [section_id],
            |r| r.get(0),
        )
        .optional()?
        .unwrap_or(0))
}

fn bump_version(conn: &Connection, section_id: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO timetable_versions(section_id, version) VALUES(?, 1)
         ON CONFLICT(section_id) DO UPDATE SET version = version + 1",
        [section_id],
    )?;
    section_version(conn, section_id)
}

/// Moves one (section, day, period) cell to its requested state inside a single
/// write transaction. On any error the transaction is rolled back and the cell
/// keeps its previous contents.
pub fn save_slot(
    conn: &Connection,
    setup: &TimetableSetup,
    edit: &SlotEdit,
    today: NaiveDate,
) -> Result<SaveOutcome, TimetableError> {
    validate(setup, edit)?;

    // IMMEDIATE takes the write lock before the conflict read, so no other
    // writer can commit a clashing slot between the check and the write.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    match apply(&tx, setup, edit, today) {
        Ok(outcome) => {
            tx.commit()?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(
                    section_id = edit.section_id,
                    error = %rollback,
                    "slot save rollback failed"
                );
            }
            Err(e)
        }
    }
}

fn apply(
    tx: &Transaction<'_>,
    setup: &TimetableSetup,
    edit: &SlotEdit,
    today: NaiveDate,
) -> Result<SaveOutcome, TimetableError> {
    let section = lookup::section_label(tx, edit.section_id)?;

    if let Some(expected) = edit.expected_version {
        let current = section_version(tx, edit.section_id)?;
        if current != expected {
            return Err(TimetableError::StaleVersion { expected, current });
        }
    }

    if let Some(faculty_id) = edit.faculty_id {
        lookup::faculty_name(tx, faculty_id)?;
        if let Some(conflict) =
            conflicts::find_conflict(tx, faculty_id, edit.day, edit.period, edit.section_id)?
        {
            tracing::info!(
                faculty_id,
                section_id = edit.section_id,
                day = edit.day.name(),
                period = edit.period,
                busy_section = conflict.section_id,
                "slot save rejected: faculty already scheduled"
            );
            return Err(TimetableError::Conflict { conflict });
        }
    }

    // A faculty-only edit still gets its conflict reported first.
    let resolution = match (edit.subject_code.as_deref(), edit.faculty_id) {
        (Some(code), Some(faculty_id)) => Some(assignments::resolve_or_create(
            tx,
            code,
            faculty_id,
            edit.section_id,
            setup.auto_create_assignments,
            &setup.academic_year_for(today),
        )?),
        (None, None) => None,
        _ => {
            return Err(TimetableError::validation(
                "subjectCode and facultyId must be supplied together",
            ))
        }
    };

    let cell = match resolution {
        None => {
            tx.execute(
                "DELETE FROM timetable_slots WHERE section_id = ? AND day = ? AND period = ?",
                params![edit.section_id, edit.day.index(), edit.period],
            )?;
            CellState::Empty
        }
        Some(assignment) => {
            let slot_id = set_cell(tx, setup, edit, &assignment)?;
            CellState::Occupied {
                slot_id,
                assignment,
            }
        }
    };

    let version = bump_version(tx, edit.section_id)?;
    tracing::info!(
        section_id = edit.section_id,
        section = %section.section_name,
        batch = %section.batch_label,
        day = edit.day.name(),
        period = edit.period,
        occupied = matches!(cell, CellState::Occupied { .. }),
        version,
        "timetable slot saved"
    );
    Ok(SaveOutcome { cell, version })
}

/// Keyed set of the (section, day, period) cell; an existing row keeps its id.
fn set_cell(
    tx: &Transaction<'_>,
    setup: &TimetableSetup,
    edit: &SlotEdit,
    assignment: &Resolution,
) -> Result<String, TimetableError> {
    let faculty_id = edit.faculty_id.ok_or_else(|| {
        TimetableError::validation("subjectCode and facultyId must be supplied together")
    })?;
    let room = edit
        .room
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let start_time = edit
        .start_time
        .or_else(|| setup.start_time_for(edit.period))
        .map(format_time);

    tx.execute(
        "INSERT INTO timetable_slots(
            id, section_id, day, period, assignment_id, faculty_id, room, kind, start_time, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(section_id, day, period) DO UPDATE SET
            assignment_id = excluded.assignment_id,
            faculty_id = excluded.faculty_id,
            room = excluded.room,
            kind = excluded.kind,
            start_time = excluded.start_time,
            updated_at = excluded.updated_at",
        params![
            uuid::Uuid::new_v4().to_string(),
            edit.section_id,
            edit.day.index(),
            edit.period,
            assignment.id(),
            faculty_id,
            room,
            edit.kind.as_str(),
            start_time,
            Utc::now().to_rfc3339()
        ],
    )?;

    let slot_id = tx.query_row(
        "SELECT id FROM timetable_slots WHERE section_id = ? AND day = ? AND period = ?",
        params![edit.section_id, edit.day.index(), edit.period],
        |r| r.get(0),
    )?;
    Ok(slot_id)
}
