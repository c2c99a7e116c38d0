use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use serde_json::Value as JsonValue;

use super::error::err;
use super::types::{AppState, Request};
use crate::timetable::policy::Caller;
use crate::timetable::Day;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, JsonValue> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, JsonValue> {
    match req.params.get(key) {
        Some(v) => v
            .as_i64()
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be integer", key), None)),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn parse_opt_i64(v: Option<&JsonValue>) -> Result<Option<i64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or("must be integer or null"),
    }
}

/// Optional string-or-null param; a wrong type becomes a bad_params response.
pub fn opt_string(req: &Request, key: &str) -> Result<Option<String>, JsonValue> {
    parse_opt_string(req.params.get(key))
        .map_err(|m| err(&req.id, "bad_params", format!("{} {}", key, m), None))
}

pub fn opt_i64(req: &Request, key: &str) -> Result<Option<i64>, JsonValue> {
    parse_opt_i64(req.params.get(key))
        .map_err(|m| err(&req.id, "bad_params", format!("{} {}", key, m), None))
}

/// Day given as a name, a three-letter abbreviation or a 0..6 index (0 = Sunday).
pub fn required_day(req: &Request, key: &str) -> Result<Day, JsonValue> {
    let parsed = match req.params.get(key) {
        Some(JsonValue::String(s)) => Day::parse(s),
        Some(v) => v.as_i64().and_then(Day::from_index),
        None => return Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    };
    parsed.ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be a weekday name or 0..6", key),
            None,
        )
    })
}

pub fn required_period(req: &Request, key: &str) -> Result<u8, JsonValue> {
    let raw = required_i64(req, key)?;
    u8::try_from(raw)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be >= 1", key), None))
}

/// `params.now` (ISO local date-time) when given, else the local clock.
pub fn request_now(req: &Request) -> Result<NaiveDateTime, JsonValue> {
    match opt_string(req, "now")? {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M"))
            .map_err(|_| {
                err(
                    &req.id,
                    "bad_params",
                    "now must be YYYY-MM-DDTHH:MM[:SS]",
                    None,
                )
            }),
        None => Ok(Local::now().naive_local()),
    }
}

pub fn caller(req: &Request) -> Result<Caller, JsonValue> {
    let Some(c) = req.caller.as_ref() else {
        return Err(err(&req.id, "unauthenticated", "missing caller", None));
    };
    if c.role.trim().is_empty() {
        return Err(err(&req.id, "unauthenticated", "caller.role must not be empty", None));
    }
    Ok(Caller {
        id: c.id.clone(),
        role: c.role.trim().to_string(),
    })
}
