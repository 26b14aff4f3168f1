#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! TOML configuration for Lifeline activation roots.
//!
//! # Usage
//!
//! ```rust
//! use lifeline_config::Config;
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     [runtime]
//!     name = "my-root"
//!     stop_policy = "fail_fast"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.runtime.name, "my-root");
//! assert_eq!(config.logging.level, "info");
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`LIFELINE_LOG`, `LIFELINE_ROOT_NAME`)
//! 2. **Config file**, when one is given and exists
//! 3. **Built-in defaults**
//!
//! # Design
//!
//! This crate has **no dependencies on other internal lifeline crates**.
//! Conversion into runtime and telemetry types happens in bridge code on the
//! consuming side.

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load from an optional file plus the process environment.
    ///
    /// # Errors
    ///
    /// See [`loader::load`].
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        loader::load(path)
    }

    /// Load a single file with no environment overrides.
    ///
    /// # Errors
    ///
    /// See [`loader::load_file`].
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// See [`loader::from_toml_str`].
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        loader::from_toml_str(text)
    }

    /// Check values against the supported sets.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::ValidationError`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate(self)
    }
}
