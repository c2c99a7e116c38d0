use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::lookup::{self, batch_label};
use super::TimetableError;

/// Outcome of a find-or-create; `Created` means the call inserted a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(String),
    Created(String),
}

impl Resolution {
    pub fn id(&self) -> &str {
        match self {
            Resolution::Existing(id) | Resolution::Created(id) => id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Existing(_) => "existing",
            Resolution::Created(_) => "created",
        }
    }
}

pub fn find_assignment(
    conn: &Connection,
    subject_id: i64,
    faculty_id: i64,
    section_id: Option<i64>,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM teaching_assignments
         WHERE subject_id = ? AND faculty_id = ? AND section_id IS ?
         ORDER BY rowid
         LIMIT 1",
        params![subject_id, faculty_id, section_id],
        |r| r.get(0),
    )
    .optional()
}

fn insert_assignment(
    conn: &Connection,
    subject_id: i64,
    faculty_id: i64,
    section_id: Option<i64>,
    academic_year: &str,
) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO teaching_assignments(id, subject_id, faculty_id, section_id, academic_year, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            id,
            subject_id,
            faculty_id,
            section_id,
            academic_year,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(id)
}

/// Section-bound assignment for (subject, faculty, section), inserting one when
/// `auto_create` allows it.
pub fn resolve_or_create(
    conn: &Connection,
    subject_code: &str,
    faculty_id: i64,
    section_id: i64,
    auto_create: bool,
    academic_year: &str,
) -> Result<Resolution, TimetableError> {
    let subject_id = lookup::subject_id_by_code(conn, subject_code)?;
    if let Some(id) = find_assignment(conn, subject_id, faculty_id, Some(section_id))? {
        return Ok(Resolution::Existing(id));
    }
    if !auto_create {
        return Err(TimetableError::validation(format!(
            "faculty {} is not assigned {} for section {}",
            faculty_id,
            subject_code.trim(),
            section_id
        )));
    }
    let id = insert_assignment(conn, subject_id, faculty_id, Some(section_id), academic_year)?;
    tracing::info!(
        assignment_id = %id,
        subject = %subject_code.trim(),
        faculty_id,
        section_id,
        "teaching assignment created on demand"
    );
    Ok(Resolution::Created(id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedSubject {
    pub subject_code: String,
    pub assignment_id: String,
    pub created: bool,
}

/// Explicit faculty-to-subject assignment. All codes are applied or none are.
pub fn assign(
    conn: &Connection,
    faculty_id: i64,
    subject_codes: &[String],
    section_id: Option<i64>,
    academic_year: &str,
) -> Result<Vec<AssignedSubject>, TimetableError> {
    lookup::faculty_name(conn, faculty_id)?;
    if let Some(sid) = section_id {
        lookup::section_label(conn, sid)?;
    }

    let tx = conn.unchecked_transaction()?;
    let mut out = Vec::with_capacity(subject_codes.len());
    for code in subject_codes {
        let subject_id = lookup::subject_id_by_code(&tx, code)?;
        let resolution = match find_assignment(&tx, subject_id, faculty_id, section_id)? {
            Some(id) => Resolution::Existing(id),
            None => Resolution::Created(insert_assignment(
                &tx,
                subject_id,
                faculty_id,
                section_id,
                academic_year,
            )?),
        };
        out.push(AssignedSubject {
            subject_code: code.trim().to_string(),
            assignment_id: resolution.id().to_string(),
            created: resolution.was_created(),
        });
    }
    tx.commit()?;
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub faculty_id: i64,
    pub faculty_name: String,
    pub section_id: Option<i64>,
    pub section_name: Option<String>,
    pub batch_label: Option<String>,
    pub academic_year: String,
}

pub fn list(
    conn: &Connection,
    faculty_id: Option<i64>,
    section_id: Option<i64>,
) -> rusqlite::Result<Vec<AssignmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, subj.code, subj.name, f.id, f.name, sec.id, sec.name,
                b.department, b.start_year, b.end_year, a.academic_year
         FROM teaching_assignments a
         JOIN subjects subj ON subj.id = a.subject_id
         JOIN faculty f ON f.id = a.faculty_id
         LEFT JOIN sections sec ON sec.id = a.section_id
         LEFT JOIN batches b ON b.id = sec.batch_id
         WHERE (?1 IS NULL OR a.faculty_id = ?1)
           AND (?2 IS NULL OR a.section_id = ?2)
         ORDER BY subj.code, f.name, sec.id",
    )?;
    let rows = stmt
        .query_map(params![faculty_id, section_id], |r| {
            let department: Option<String> = r.get(7)?;
            let start_year: Option<i64> = r.get(8)?;
            let end_year: Option<i64> = r.get(9)?;
            let batch = match (department, start_year, end_year) {
                (Some(d), Some(s), Some(e)) => Some(batch_label(&d, s, e)),
                _ => None,
            };
            Ok(AssignmentRow {
                id: r.get(0)?,
                subject_code: r.get(1)?,
                subject_name: r.get(2)?,
                faculty_id: r.get(3)?,
                faculty_name: r.get(4)?,
                section_id: r.get(5)?,
                section_name: r.get(6)?,
                batch_label: batch,
                academic_year: r.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
