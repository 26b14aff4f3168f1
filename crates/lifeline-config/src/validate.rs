//! Configuration validation.
//!
//! Checks that deserialized [`Config`](crate::Config) values are within the
//! sets the runtime and telemetry crates understand.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 4] = ["pretty", "compact", "json", "full"];
const STOP_POLICIES: [&str; 2] = ["drain_all", "fail_fast"];

/// Validate a deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_runtime(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_runtime(config: &Config) -> ConfigResult<()> {
    let r = &config.runtime;

    if r.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "runtime.name".to_owned(),
            message: "must not be empty".to_owned(),
        });
    }

    one_of("runtime.stop_policy", &r.stop_policy, &STOP_POLICIES)
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if l.level.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: "must not be empty".to_owned(),
        });
    }
    one_of("logging.level", &l.level.to_ascii_lowercase(), &LOG_LEVELS)?;
    one_of("logging.format", &l.format, &LOG_FORMATS)?;

    if let Some(directive) = l.directives.iter().find(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "logging.directives".to_owned(),
            message: format!("empty directive '{directive}'"),
        });
    }
    Ok(())
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        field: field.to_owned(),
        message: format!(
            "unsupported value '{value}'; expected one of: {}",
            allowed.join(", ")
        ),
    })
}
