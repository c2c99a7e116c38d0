use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use super::assignments;
use super::next_occurrence::{self, ClassKey, WeeklySlot};
use super::projector::{self, DisplaySlot, ScheduleFilter};
use super::{parse_time, Day, TimetableError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStat {
    pub subject_code: String,
    pub subject_name: String,
    pub section_id: i64,
    pub section_name: String,
    pub batch_label: String,
    pub faculty_name: Option<String>,
    pub weekly_sessions: usize,
    pub room: Option<String>,
    pub next_class: String,
}

#[derive(Default)]
struct KeyInfo {
    subject_name: String,
    section_name: String,
    batch_label: String,
    faculty_name: Option<String>,
    weekly_sessions: usize,
}

fn weekly_slot(d: &DisplaySlot) -> Option<WeeklySlot> {
    Some(WeeklySlot {
        key: ClassKey {
            subject_code: d.subject_code.clone()?,
            section_id: d.section_id,
        },
        day: Day::from_index(i64::from(d.day))?,
        start_time: d.start_time.as_deref().and_then(parse_time),
        room: d.room.clone(),
    })
}

/// Per (subject, section) summary for a faculty member's or a section's classes.
///
/// Section-bound assignments with nothing scheduled still appear, labelled "TBA".
pub fn class_stats(
    conn: &Connection,
    filter: ScheduleFilter,
    now: NaiveDateTime,
) -> Result<Vec<ClassStat>, TimetableError> {
    let (faculty_id, section_id) = match filter {
        ScheduleFilter::Faculty(id) => (Some(id), None),
        ScheduleFilter::Section(id) => (None, Some(id)),
        ScheduleFilter::All => {
            return Err(TimetableError::validation(
                "class statistics need a faculty or a section",
            ))
        }
    };

    let display = projector::project(conn, filter)?;
    let mut info: BTreeMap<ClassKey, KeyInfo> = BTreeMap::new();

    for a in assignments::list(conn, faculty_id, section_id)? {
        let (Some(sid), Some(section_name), Some(batch)) = (a.section_id, a.section_name, a.batch_label)
        else {
            continue;
        };
        let key = ClassKey {
            subject_code: a.subject_code,
            section_id: sid,
        };
        let entry = info.entry(key).or_default();
        entry.subject_name = a.subject_name;
        entry.section_name = section_name;
        entry.batch_label = batch;
        if entry.faculty_name.is_none() {
            entry.faculty_name = Some(a.faculty_name);
        }
    }

    let slots: Vec<WeeklySlot> = display.iter().filter_map(weekly_slot).collect();
    for (d, s) in display.iter().filter_map(|d| weekly_slot(d).map(|s| (d, s))) {
        let entry = info.entry(s.key).or_default();
        entry.subject_name = d.subject_name.clone();
        entry.section_name = d.section_name.clone();
        entry.batch_label = d.batch_label.clone();
        if entry.faculty_name.is_none() {
            entry.faculty_name = d.faculty_name.clone();
        }
        entry.weekly_sessions += 1;
    }

    let next = next_occurrence::resolve_for_keys(info.keys().cloned(), &slots, now);
    let stats = info
        .into_iter()
        .map(|(key, i)| {
            let n = next.get(&key);
            ClassStat {
                subject_code: key.subject_code,
                subject_name: i.subject_name,
                section_id: key.section_id,
                section_name: i.section_name,
                batch_label: i.batch_label,
                faculty_name: i.faculty_name,
                weekly_sessions: i.weekly_sessions,
                room: n.and_then(|n| n.room.clone()),
                next_class: n
                    .map(|n| n.label.clone())
                    .unwrap_or_else(|| next_occurrence::TBA_LABEL.to_string()),
            }
        })
        .collect();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::setup::TimetableSetup;
    use crate::timetable::upsert::{save_slot, SlotEdit};
    use crate::timetable::test_fixtures::seeded_conn;
    use crate::timetable::SessionKind;
    use chrono::NaiveDate;

    fn put(conn: &Connection, section: i64, day: Day, period: u8, subject: &str, room: Option<&str>) {
        let edit = SlotEdit {
            section_id: section,
            day,
            period,
            subject_code: Some(subject.to_string()),
            faculty_id: Some(7),
            room: room.map(str::to_string),
            kind: SessionKind::Theory,
            start_time: None,
            expected_version: None,
        };
        save_slot(
            conn,
            &TimetableSetup::default(),
            &edit,
            NaiveDate::from_ymd_opt(2026, 10, 16).expect("date"),
        )
        .expect("save");
    }

    fn thursday_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 15)
            .expect("date")
            .and_time(parse_time("12:00").expect("time"))
    }

    #[test]
    fn faculty_stats_combine_schedule_and_assignments() {
        let conn = seeded_conn();
        put(&conn, 10, Day::Monday, 1, "CS101", None);
        put(&conn, 10, Day::Friday, 2, "CS101", Some("LH1"));
        put(&conn, 12, Day::Thursday, 6, "CS101", Some("EC-3"));
        assignments::assign(&conn, 7, &["CS102".to_string()], Some(11), "2026-2027")
            .expect("unscheduled assignment");

        let stats = class_stats(&conn, ScheduleFilter::Faculty(7), thursday_noon()).expect("stats");
        assert_eq!(stats.len(), 3);

        let cs101_a = stats
            .iter()
            .find(|s| s.subject_code == "CS101" && s.section_id == 10)
            .expect("cs101 A");
        assert_eq!(cs101_a.weekly_sessions, 2);
        assert_eq!(cs101_a.next_class, "Friday, 09:50");
        assert_eq!(cs101_a.room.as_deref(), Some("LH1"));

        let ece = stats.iter().find(|s| s.section_id == 12).expect("ece");
        assert_eq!(ece.next_class, "Today, 13:30");
        assert_eq!(ece.batch_label, "ECE 2025-2029");

        let pending = stats.iter().find(|s| s.subject_code == "CS102").expect("cs102");
        assert_eq!(pending.next_class, "TBA");
        assert_eq!(pending.weekly_sessions, 0);
        assert_eq!(pending.section_name, "B");
    }

    #[test]
    fn section_stats_only_cover_that_section() {
        let conn = seeded_conn();
        put(&conn, 10, Day::Monday, 1, "CS101", None);
        put(&conn, 12, Day::Monday, 2, "CS101", None);
        let stats = class_stats(&conn, ScheduleFilter::Section(12), thursday_noon()).expect("stats");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].next_class, "Monday, 09:50");
        assert_eq!(stats[0].faculty_name.as_deref(), Some("Dr. Rao"));
    }

    #[test]
    fn unfiltered_stats_are_rejected() {
        let conn = seeded_conn();
        assert!(matches!(
            class_stats(&conn, ScheduleFilter::All, thursday_noon()),
            Err(TimetableError::Validation(_))
        ));
    }
}
