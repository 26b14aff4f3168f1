//! Lifeline Telemetry - logging setup for Lifeline runtimes.
//!
//! Lifeline crates emit `tracing` events with structured fields (`root`,
//! `watcher`, `gate`, `resource_id`). This crate installs a
//! `tracing-subscriber` pipeline that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use lifeline_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), lifeline_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("lifeline_registry=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!(root = "demo", "Root activated");
//! # Ok(())
//! # }
//! ```
//!
//! With the `config` feature, [`LogConfig::from_section`] builds a config
//! from the `[logging]` table of a `lifeline-config` file.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
    setup_logging_with_writer,
};
