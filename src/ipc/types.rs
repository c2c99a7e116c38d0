use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// Identity attached by the authenticating front end; the daemon trusts it as given.
#[derive(Debug, Deserialize, Clone)]
pub struct CallerInfo {
    pub id: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub caller: Option<CallerInfo>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
