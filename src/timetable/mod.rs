//! Weekly timetable allocation: lazily provisioned teaching assignments,
//! per-cell slot edits with faculty conflict checks, and read-side
//! projections of the stored grid.

pub mod assignments;
pub mod conflicts;
pub mod error;
pub mod lookup;
pub mod next_occurrence;
pub mod policy;
pub mod projector;
pub mod setup;
pub mod stats;
pub mod upsert;

use chrono::{NaiveTime, Weekday};

pub use error::TimetableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    /// 0 = Sunday .. 6 = Saturday.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(i: i64) -> Option<Self> {
        usize::try_from(i).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    /// Accepts full names, three-letter abbreviations (any case) or a 0..6 index.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Self::from_index(i);
        }
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| {
            let name = d.name().to_ascii_lowercase();
            lower == name || (lower.len() == 3 && name.starts_with(&lower))
        })
    }

    pub fn from_weekday(w: Weekday) -> Self {
        match w {
            Weekday::Sun => Day::Sunday,
            Weekday::Mon => Day::Monday,
            Weekday::Tue => Day::Tuesday,
            Weekday::Wed => Day::Wednesday,
            Weekday::Thu => Day::Thursday,
            Weekday::Fri => Day::Friday,
            Weekday::Sat => Day::Saturday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionKind {
    #[default]
    Theory,
    Lab,
    Tutorial,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Theory => "theory",
            SessionKind::Lab => "lab",
            SessionKind::Tutorial => "tutorial",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "theory" => Some(SessionKind::Theory),
            "lab" => Some(SessionKind::Lab),
            "tutorial" => Some(SessionKind::Tutorial),
            _ => None,
        }
    }
}

pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

pub fn format_time(t: NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_parse_accepts_names_abbreviations_and_indices() {
        assert_eq!(Day::parse("Monday"), Some(Day::Monday));
        assert_eq!(Day::parse("mon"), Some(Day::Monday));
        assert_eq!(Day::parse("SAT"), Some(Day::Saturday));
        assert_eq!(Day::parse("0"), Some(Day::Sunday));
        assert_eq!(Day::parse("7"), None);
        assert_eq!(Day::parse("mo"), None);
        assert_eq!(Day::parse("Funday"), None);
    }

    #[test]
    fn day_index_matches_sunday_first_week() {
        assert_eq!(Day::Sunday.index(), 0);
        assert_eq!(Day::Saturday.index(), 6);
        assert_eq!(Day::from_weekday(Weekday::Wed), Day::Wednesday);
    }

    #[test]
    fn session_kind_defaults_to_theory() {
        assert_eq!(SessionKind::default(), SessionKind::Theory);
        assert_eq!(SessionKind::parse(" LAB "), Some(SessionKind::Lab));
        assert_eq!(SessionKind::parse("seminar"), None);
    }
}
