use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const DB_FILE_NAME: &str = "timetable.sqlite3";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    // Several sidecars may share one workspace; writers wait on each other instead of failing.
    conn.busy_timeout(BUSY_TIMEOUT)?;
    init_schema(&conn)?;
    tracing::info!(path = %db_path.display(), "workspace database opened");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS batches(
            id INTEGER PRIMARY KEY,
            department TEXT NOT NULL,
            start_year INTEGER NOT NULL,
            end_year INTEGER NOT NULL,
            current_semester INTEGER,
            semester_start TEXT,
            semester_end TEXT,
            UNIQUE(department, start_year, end_year)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS faculty(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT,
            email TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id INTEGER PRIMARY KEY,
            batch_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 60,
            tutor_id INTEGER,
            FOREIGN KEY(batch_id) REFERENCES batches(id),
            FOREIGN KEY(tutor_id) REFERENCES faculty(id),
            UNIQUE(batch_id, name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_batch ON sections(batch_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 0,
            semester INTEGER,
            kind TEXT NOT NULL DEFAULT 'theory'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teaching_assignments(
            id TEXT PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            faculty_id INTEGER NOT NULL,
            section_id INTEGER,
            academic_year TEXT NOT NULL,
            created_at TEXT,
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(faculty_id) REFERENCES faculty(id),
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    // One section-bound row per triple, one general row per (subject, faculty).
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_assignments_section_bound
         ON teaching_assignments(subject_id, faculty_id, section_id)
         WHERE section_id IS NOT NULL",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_assignments_general
         ON teaching_assignments(subject_id, faculty_id)
         WHERE section_id IS NULL",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_faculty ON teaching_assignments(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_slots(
            id TEXT NOT NULL UNIQUE,
            section_id INTEGER NOT NULL,
            day INTEGER NOT NULL,
            period INTEGER NOT NULL,
            assignment_id TEXT NOT NULL,
            faculty_id INTEGER NOT NULL,
            room TEXT,
            kind TEXT NOT NULL DEFAULT 'theory',
            start_time TEXT,
            updated_at TEXT,
            PRIMARY KEY(section_id, day, period),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(assignment_id) REFERENCES teaching_assignments(id),
            FOREIGN KEY(faculty_id) REFERENCES faculty(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_slots_day_period ON timetable_slots(day, period)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_slots_assignment ON timetable_slots(assignment_id)",
        [],
    )?;
    // A faculty member occupies at most one cell per (day, period) across all sections.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_slots_faculty_time
         ON timetable_slots(faculty_id, day, period)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_versions(
            section_id INTEGER PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, raw),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'uq_%'",
                [],
                |r| r.get(0),
            )
            .expect("index count");
        assert_eq!(indexes, 3);
    }

    #[test]
    fn settings_roundtrip_overwrites_previous_value() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        assert!(settings_get_json(&conn, "setup.timetable").expect("get").is_none());
        settings_set_json(&conn, "setup.timetable", &json!({ "periodsPerDay": 6 })).expect("set");
        settings_set_json(&conn, "setup.timetable", &json!({ "periodsPerDay": 7 })).expect("set");
        let v = settings_get_json(&conn, "setup.timetable").expect("get").expect("value");
        assert_eq!(v["periodsPerDay"], 7);
    }
}
