//! Environment variable overrides.
//!
//! Overrides are applied after the file is parsed and before validation.
//! Empty values are ignored.

use std::collections::HashMap;

use tracing::debug;

use crate::types::Config;

/// Overrides `logging.level`.
pub const ENV_LOG: &str = "LIFELINE_LOG";
/// Overrides `runtime.name`.
pub const ENV_ROOT_NAME: &str = "LIFELINE_ROOT_NAME";

/// Snapshot the `LIFELINE_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("LIFELINE_"))
        .collect()
}

/// Apply overrides from `vars` onto `config`.
///
/// Returns the names of the variables that took effect.
pub fn apply_env_overrides(config: &mut Config, vars: &HashMap<String, String>) -> Vec<&'static str> {
    let mut applied = Vec::new();

    if let Some(level) = non_empty(vars, ENV_LOG) {
        debug!(var = ENV_LOG, value = level, "Log level overridden from environment");
        config.logging.level = level.to_owned();
        applied.push(ENV_LOG);
    }

    if let Some(name) = non_empty(vars, ENV_ROOT_NAME) {
        debug!(var = ENV_ROOT_NAME, value = name, "Root name overridden from environment");
        config.runtime.name = name.to_owned();
        applied.push(ENV_ROOT_NAME);
    }

    applied
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}
