//! Configuration struct definitions.
//!
//! Every section uses `#[serde(default)]`, so any subset of keys may be
//! given and the rest fall back to their defaults.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Activation root settings.
    pub runtime: RuntimeSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// RuntimeSection
// ---------------------------------------------------------------------------

/// Activation root settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Name of the activation root, used in logs and errors.
    pub name: String,
    /// How scopes react to a failing member stop: `"drain_all"` stops every
    /// member and then reports, `"fail_fast"` gives up at the first failure.
    pub stop_policy: String,
    /// Log a warning when a root activates with no handlers registered.
    pub warn_without_handlers: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            name: "lifeline".to_owned(),
            stop_policy: "drain_all".to_owned(),
            warn_without_handlers: true,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["lifeline_presence=trace"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.runtime.name, "lifeline");
        assert_eq!(config.runtime.stop_policy, "drain_all");
        assert!(config.runtime.warn_without_handlers);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.logging.directives.is_empty());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [runtime]
            stop_policy = "fail_fast"
            "#,
        )
        .unwrap();
        assert_eq!(config.runtime.stop_policy, "fail_fast");
        assert_eq!(config.runtime.name, "lifeline");
        assert_eq!(config.logging, LoggingSection::default());
    }

    #[test]
    fn test_serialize_roundtrips_through_toml() {
        let mut config = Config::default();
        config.logging.directives.push("lifeline_registry=trace".to_owned());
        let text = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
