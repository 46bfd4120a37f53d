//! Tracing subscriber setup for applications embedding the lifecycle.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the host application, which may call [`setup_logging`] once at startup.

use crate::debug::PING_LOG_TARGET;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Noisy dependency targets capped below the default level.
const DEFAULT_DIRECTIVES: &[(&str, LogLevel)] = &[("sled", LogLevel::Warn), ("tokio", LogLevel::Warn)];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {details}")]
    InvalidFilter { filter: String, details: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InitFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Builds the `EnvFilter` directive string. Payload traces on
/// [`PING_LOG_TARGET`] always pass at `info` so `log_pings` works under a
/// stricter default level.
pub fn build_filter_string(default_level: LogLevel) -> String {
    let mut parts = Vec::with_capacity(DEFAULT_DIRECTIVES.len() + 2);
    parts.push(default_level.as_str().to_string());

    for (target, level) in DEFAULT_DIRECTIVES {
        parts.push(format!("{target}={}", level.as_str()));
    }
    parts.push(format!("{PING_LOG_TARGET}=info"));

    parts.join(",")
}

/// Installs the global subscriber. `RUST_LOG`, when set, replaces the built-in
/// filter. Subsequent calls are no-ops.
pub fn setup_logging(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let filter_string = build_filter_string(level);
            EnvFilter::try_new(&filter_string).map_err(|e| LoggingError::InvalidFilter {
                filter: filter_string.clone(),
                details: e.to_string(),
            })?
        }
    };

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(true))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).compact())
            .try_init(),
    };
    result.map_err(|e| LoggingError::InitFailed(e.to_string()))?;

    let _ = LOGGING_INIT.set(());
    Ok(())
}
