use chrono::{Datelike, NaiveDate, NaiveTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{parse_time, TimetableError};
use crate::db;

pub const SETUP_KEY: &str = "setup.timetable";
pub const MAX_PERIODS_PER_DAY: i64 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSetup {
    pub periods_per_day: u8,
    pub period_start_times: Vec<String>,
    pub editor_roles: Vec<String>,
    pub auto_create_assignments: bool,
    pub academic_year: Option<String>,
}

impl Default for TimetableSetup {
    fn default() -> Self {
        Self {
            periods_per_day: 8,
            period_start_times: [
                "09:00", "09:50", "10:40", "11:30", "12:20", "13:30", "14:20", "15:10",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            editor_roles: vec!["admin".to_string()],
            auto_create_assignments: true,
            academic_year: None,
        }
    }
}

impl TimetableSetup {
    /// Bell-schedule start of a 1-based period, when one is configured.
    pub fn start_time_for(&self, period: u8) -> Option<NaiveTime> {
        let idx = usize::from(period).checked_sub(1)?;
        self.period_start_times.get(idx).and_then(|s| parse_time(s))
    }

    pub fn allows_role(&self, role: &str) -> bool {
        let role = role.trim();
        self.editor_roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Configured academic year, else the July-to-June year containing `today`.
    pub fn academic_year_for(&self, today: NaiveDate) -> String {
        if let Some(y) = self.academic_year.as_deref() {
            return y.to_string();
        }
        let start = if today.month() >= 7 {
            today.year()
        } else {
            today.year() - 1
        };
        format!("{}-{}", start, start + 1)
    }
}

pub fn default_json() -> Value {
    serde_json::to_value(TimetableSetup::default()).unwrap_or_else(|_| json!({}))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_array(v: &Value, key: &str) -> Result<Vec<String>, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be array of strings", key))?;
    arr.iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| format!("{} must be array of strings", key))
        })
        .collect()
}

pub fn merge_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "periodsPerDay" => {
                obj.insert(
                    k.clone(),
                    Value::from(parse_i64_range(v, k, 1, MAX_PERIODS_PER_DAY)?),
                );
            }
            "periodStartTimes" => {
                let times = parse_string_array(v, k)?;
                if let Some(bad) = times.iter().find(|t| parse_time(t).is_none()) {
                    return Err(format!("{} entry '{}' must be HH:MM", k, bad));
                }
                if times.len() as i64 > MAX_PERIODS_PER_DAY {
                    return Err(format!("{} must have at most {} entries", k, MAX_PERIODS_PER_DAY));
                }
                obj.insert(k.clone(), json!(times));
            }
            "editorRoles" => {
                let roles: Vec<String> = parse_string_array(v, k)?
                    .into_iter()
                    .filter(|r| !r.is_empty())
                    .map(|r| r.to_ascii_lowercase())
                    .collect();
                if roles.is_empty() {
                    return Err(format!("{} must contain at least one role", k));
                }
                obj.insert(k.clone(), json!(roles));
            }
            "autoCreateAssignments" => {
                let b = v
                    .as_bool()
                    .ok_or_else(|| format!("{} must be boolean", k))?;
                obj.insert(k.clone(), Value::Bool(b));
            }
            "academicYear" => {
                if v.is_null() {
                    obj.insert(k.clone(), Value::Null);
                    continue;
                }
                let s = v
                    .as_str()
                    .map(str::trim)
                    .ok_or_else(|| format!("{} must be string or null", k))?;
                if s.is_empty() || s.len() > 16 {
                    return Err(format!("{} must be 1..=16 characters", k));
                }
                obj.insert(k.clone(), Value::String(s.to_string()));
            }
            _ => return Err(format!("unknown timetable field: {}", k)),
        }
    }
    Ok(())
}

/// Defaults overlaid with whatever valid values were saved.
pub fn load_json(conn: &Connection) -> anyhow::Result<Value> {
    let mut current = default_json();
    if let Some(saved) = db::settings_get_json(conn, SETUP_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                if let Err(msg) = merge_patch(&mut current, &single) {
                    tracing::warn!(key = %k, %msg, "ignoring invalid saved timetable setting");
                }
            }
        }
    }
    Ok(current)
}

pub fn load(conn: &Connection) -> Result<TimetableSetup, TimetableError> {
    let raw = load_json(conn).map_err(|e| TimetableError::Setup(e.to_string()))?;
    serde_json::from_value(raw).map_err(|e| TimetableError::Setup(e.to_string()))
}

pub fn save_patch(conn: &Connection, patch: &Map<String, Value>) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_json(conn)?;
    if let Err(msg) = merge_patch(&mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, SETUP_KEY, &current)?;
    Ok(Ok(current))
}
