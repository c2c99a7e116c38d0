use serde_json::json;
use thiserror::Error;

use super::conflicts::ConflictingSection;

#[derive(Debug, Error)]
pub enum TimetableError {
    /// Subject, section, batch or faculty absent from the catalog.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Faculty already committed to another section at the requested time.
    #[error(
        "faculty {} is already teaching {} section {} on {} period {}",
        .conflict.faculty_id,
        .conflict.batch_label,
        .conflict.section_name,
        .conflict.day_name,
        .conflict.period
    )]
    Conflict { conflict: ConflictingSection },

    #[error("{0}")]
    Validation(String),

    #[error("section timetable changed (expected version {expected}, current {current})")]
    StaleVersion { expected: i64, current: i64 },

    #[error("role '{role}' may not edit timetable slots")]
    Forbidden { role: String },

    #[error("failed to read timetable setup: {0}")]
    Setup(String),

    #[error(transparent)]
    Persistence(#[from] rusqlite::Error),
}

impl TimetableError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Validation(_) => "bad_params",
            Self::StaleVersion { .. } => "stale_version",
            Self::Forbidden { .. } => "forbidden",
            Self::Setup(_) | Self::Persistence(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound { entity, key } => Some(json!({ "entity": entity, "key": key })),
            Self::Conflict { conflict } => serde_json::to_value(conflict).ok(),
            Self::StaleVersion { expected, current } => Some(json!({
                "expectedVersion": expected,
                "currentVersion": current
            })),
            _ => None,
        }
    }
}
