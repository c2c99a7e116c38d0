use chrono::{Datelike, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

use super::{format_time, Day};

pub const TBA_LABEL: &str = "TBA";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassKey {
    pub subject_code: String,
    pub section_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySlot {
    pub key: ClassKey,
    pub day: Day,
    pub start_time: Option<NaiveTime>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextOccurrence {
    pub label: String,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    days_ahead: u8,
    start: NaiveTime,
    label: String,
}

fn candidate(slot: &WeeklySlot, now: NaiveDateTime) -> Candidate {
    let today = Day::from_weekday(now.weekday());
    let days_ahead = (slot.day.index() + 7 - today.index()) % 7;
    let day_label = |t: Option<NaiveTime>| match t {
        Some(t) => format!("{}, {}", slot.day.name(), format_time(t)),
        None => slot.day.name().to_string(),
    };

    let (days_ahead, label) = match (days_ahead, slot.start_time) {
        (0, Some(t)) if t > now.time() => (0, format!("Today, {}", format_time(t))),
        (0, None) => (0, "Today".to_string()),
        // Already started today: the next one is a week out.
        (0, Some(t)) => (7, day_label(Some(t))),
        (n, t) => (n, day_label(t)),
    };
    Candidate {
        days_ahead,
        start: slot.start_time.unwrap_or(NaiveTime::MIN),
        label,
    }
}

/// Soonest upcoming occurrence per (subject, section) among `slots`, plus the
/// first room recorded for each key. Ties keep the earlier slot.
pub fn resolve(slots: &[WeeklySlot], now: NaiveDateTime) -> BTreeMap<ClassKey, NextOccurrence> {
    let mut best: BTreeMap<ClassKey, (Candidate, Option<String>)> = BTreeMap::new();
    for slot in slots {
        let c = candidate(slot, now);
        let room = slot
            .room
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        match best.get_mut(&slot.key) {
            None => {
                best.insert(slot.key.clone(), (c, room));
            }
            Some((current, current_room)) => {
                if (c.days_ahead, c.start) < (current.days_ahead, current.start) {
                    *current = c;
                }
                if current_room.is_none() {
                    *current_room = room;
                }
            }
        }
    }
    best.into_iter()
        .map(|(k, (c, room))| {
            (
                k,
                NextOccurrence {
                    label: c.label,
                    room,
                },
            )
        })
        .collect()
}

/// Like [`resolve`], but every key in `keys` gets an entry; keys without a slot read "TBA".
pub fn resolve_for_keys<I>(
    keys: I,
    slots: &[WeeklySlot],
    now: NaiveDateTime,
) -> BTreeMap<ClassKey, NextOccurrence>
where
    I: IntoIterator<Item = ClassKey>,
{
    let mut out = resolve(slots, now);
    for k in keys {
        out.entry(k).or_insert_with(|| NextOccurrence {
            label: TBA_LABEL.to_string(),
            room: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::parse_time;
    use chrono::NaiveDate;

    // 2026-10-14 is a Wednesday.
    fn wednesday_at(hh_mm: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 14)
            .expect("date")
            .and_time(parse_time(hh_mm).expect("time"))
    }

    fn key(code: &str, section: i64) -> ClassKey {
        ClassKey {
            subject_code: code.to_string(),
            section_id: section,
        }
    }

    fn slot(code: &str, day: Day, at: Option<&str>, room: Option<&str>) -> WeeklySlot {
        WeeklySlot {
            key: key(code, 10),
            day,
            start_time: at.and_then(parse_time),
            room: room.map(str::to_string),
        }
    }

    #[test]
    fn later_today_wins_over_other_days() {
        let slots = vec![
            slot("CS101", Day::Thursday, Some("09:00"), None),
            slot("CS101", Day::Wednesday, Some("14:20"), Some("LH1")),
        ];
        let out = resolve(&slots, wednesday_at("10:00"));
        let n = &out[&key("CS101", 10)];
        assert_eq!(n.label, "Today, 14:20");
        assert_eq!(n.room.as_deref(), Some("LH1"));
    }

    #[test]
    fn earlier_today_wraps_to_next_week() {
        let slots = vec![slot("CS101", Day::Wednesday, Some("09:00"), None)];
        let out = resolve(&slots, wednesday_at("10:00"));
        assert_eq!(out[&key("CS101", 10)].label, "Wednesday, 09:00");
    }

    #[test]
    fn soonest_day_is_chosen_regardless_of_input_order() {
        let slots = vec![
            slot("CS101", Day::Tuesday, Some("09:00"), None),
            slot("CS101", Day::Saturday, Some("11:30"), None),
            slot("CS101", Day::Friday, Some("15:10"), None),
        ];
        let out = resolve(&slots, wednesday_at("16:00"));
        assert_eq!(out[&key("CS101", 10)].label, "Friday, 15:10");
    }

    #[test]
    fn week_wraps_past_saturday() {
        let slots = vec![
            slot("CS101", Day::Tuesday, Some("09:00"), None),
            slot("CS101", Day::Monday, Some("12:20"), None),
        ];
        let now = NaiveDate::from_ymd_opt(2026, 10, 17)
            .expect("date")
            .and_time(parse_time("08:00").expect("time"));
        let out = resolve(&slots, now);
        assert_eq!(out[&key("CS101", 10)].label, "Monday, 12:20");
    }

    #[test]
    fn missing_times_use_bare_labels() {
        let slots = vec![
            slot("CS101", Day::Wednesday, None, None),
            WeeklySlot {
                key: key("CS102", 11),
                day: Day::Friday,
                start_time: None,
                room: Some("  ".to_string()),
            },
        ];
        let out = resolve(&slots, wednesday_at("23:00"));
        assert_eq!(out[&key("CS101", 10)].label, "Today");
        let lab = &out[&key("CS102", 11)];
        assert_eq!(lab.label, "Friday");
        assert!(lab.room.is_none());
    }

    #[test]
    fn room_comes_from_first_slot_that_has_one() {
        let slots = vec![
            slot("CS101", Day::Monday, Some("09:00"), None),
            slot("CS101", Day::Tuesday, Some("09:00"), Some("LAB2")),
            slot("CS101", Day::Thursday, Some("09:00"), Some("LH9")),
        ];
        let out = resolve(&slots, wednesday_at("10:00"));
        let n = &out[&key("CS101", 10)];
        assert_eq!(n.label, "Thursday, 09:00");
        assert_eq!(n.room.as_deref(), Some("LAB2"));
    }

    #[test]
    fn keys_without_slots_are_tba() {
        let slots = vec![slot("CS101", Day::Monday, Some("09:00"), None)];
        let out = resolve_for_keys(
            vec![key("CS101", 10), key("CS102", 10)],
            &slots,
            wednesday_at("10:00"),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[&key("CS102", 10)].label, TBA_LABEL);
        assert_eq!(out[&key("CS101", 10)].label, "Monday, 09:00");
    }
}
