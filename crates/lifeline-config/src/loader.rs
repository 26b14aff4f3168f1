//! Config file loading.
//!
//! [`load`] reads an optional file, falls back to defaults when it is absent,
//! applies environment overrides and validates the result.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Parse and validate configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] for malformed TOML and
/// [`ConfigError::ValidationError`] for out-of-range values.
pub fn from_toml_str(text: &str) -> ConfigResult<Config> {
    let config = parse(text, "<string>")?;
    validate::validate(&config)?;
    Ok(config)
}

/// Load a config from a specific file path, without environment overrides.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or
/// validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read(path)?;
    let config = parse(&content, &path.display().to_string())?;
    validate::validate(&config)?;
    Ok(config)
}

/// Load configuration from `path` (if given and present) plus the process
/// environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if an existing file is malformed or the final
/// configuration fails validation. A missing file is not an error.
pub fn load(path: Option<&Path>) -> ConfigResult<Config> {
    load_with_env(path, &collect_env_vars())
}

/// Like [`load`], with the environment supplied by the caller.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> ConfigResult<Config> {
    let mut config = match path {
        Some(path) => try_load_file(path)?.unwrap_or_default(),
        None => Config::default(),
    };

    let applied = apply_env_overrides(&mut config, env);
    validate::validate(&config)?;

    info!(
        root = %config.runtime.name,
        stop_policy = %config.runtime.stop_policy,
        env_overrides = applied.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Try to load a file, returning `None` if it doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<Config>> {
    let content = match read(path) {
        Ok(c) => c,
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };
    parse(&content, &path.display().to_string()).map(Some)
}

fn read(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    // Checked after reading so there is no gap between stat and read.
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }
    Ok(content)
}

fn parse(text: &str, origin: &str) -> ConfigResult<Config> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })
}
