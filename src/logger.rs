//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after settings are resolved.  Library code
//! only emits events; installing the subscriber is the binary's job.

use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Install the global subscriber, writing to stderr so command output on
/// stdout stays machine-readable.
///
/// With `prefer_level`, the configured `level` wins and `RUST_LOG` is only
/// consulted when `level` does not parse.  Without it, a valid `RUST_LOG`
/// wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let rust_log = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, rust_log.as_deref(), prefer_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Pick the effective filter from the configured level and a `RUST_LOG`
/// value.  An unset or blank `RUST_LOG` counts as absent.
pub fn build_filter(
    level: &str,
    rust_log: Option<&str>,
    prefer_level: bool,
) -> Result<EnvFilter, AppError> {
    let configured = parse_level(level);
    let from_env = rust_log
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::try_new);

    if prefer_level {
        return match (configured, from_env) {
            (Ok(filter), _) => Ok(filter),
            (Err(_), Some(Ok(filter))) => Ok(filter),
            (Err(level_err), Some(Err(env_err))) => Err(AppError::Logger(format!(
                "{level_err}; RUST_LOG parse failed: {env_err}"
            ))),
            (Err(level_err), None) => Err(level_err),
        };
    }

    match from_env {
        Some(Ok(filter)) => Ok(filter),
        _ => configured,
    }
}

/// Parse a configured level into a filter, rejecting strings [`init`] could
/// not use on its own.
///
/// A bare word must be a level name (`"warn"`); anything with `=` or `,` is
/// handed to `EnvFilter` as a directive list (`"ampl=debug,rusqlite=warn"`).
pub fn parse_level(level: &str) -> Result<EnvFilter, AppError> {
    let level = level.trim();
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    if level.contains(['=', ',']) {
        return EnvFilter::try_new(level)
            .map_err(|e| AppError::Logger(format!("invalid log directive '{level}': {e}")));
    }
    let max = level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))?;
    EnvFilter::try_new(max.to_string())
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}
