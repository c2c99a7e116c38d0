//! Diagnostic logging for the daemon.
//!
//! stdout carries the request/response protocol, so every event goes to
//! stderr. The filter comes from `TIMETABLED_LOG` (an `EnvFilter` directive,
//! default `warn`) and the output shape from `TIMETABLED_LOG_FORMAT`
//! (`compact` or `json`).

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const FILTER_ENV: &str = "TIMETABLED_LOG";
pub const FORMAT_ENV: &str = "TIMETABLED_LOG_FORMAT";
const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(FILTER_ENV).ok().as_deref(),
            std::env::var(FORMAT_ENV).ok().as_deref(),
        )
    }

    fn from_values(filter: Option<&str>, format: Option<&str>) -> Self {
        let filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FILTER)
            .to_string();
        // Unknown formats fall back to compact rather than refusing to start.
        let format = format.and_then(LogFormat::parse).unwrap_or_default();
        Self { filter, format }
    }
}

fn build_env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(config: &LogConfig) {
    let filter = build_env_filter(&config.filter);
    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr).with_target(true))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_ansi(false)
                    .with_target(false),
            )
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}
