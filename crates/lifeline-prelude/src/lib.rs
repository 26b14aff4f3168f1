//! Unified prelude for Lifeline.
//!
//! This crate provides a single import to bring in all commonly used types
//! from across Lifeline.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use lifeline_prelude::*;
//!
//! // Types from:
//! // - lifeline-capsule (capsules, scopes, contexts)
//! // - lifeline-registry (registry, filters, references)
//! // - lifeline-presence (watchers, gates, providers)
//! // - lifeline-runtime (Lifeline, activation signals)
//! // - lifeline-config (Config)
//! // - lifeline-telemetry (logging setup)
//!
//! # fn main() -> RuntimeResult<()> {
//! let config = Config::default();
//! let lifeline = Lifeline::from_config(&config);
//! let registry = InMemoryRegistry::new();
//! lifeline.on_activate(ActivationSignal::new("prelude", Arc::new(registry)))?;
//! assert!(lifeline.is_active());
//! # Ok(())
//! # }
//! ```
//!
//! # Per-Crate Preludes
//!
//! If you only need types from specific crates, use their individual preludes:
//!
//! ```rust,ignore
//! use lifeline_capsule::prelude::*;
//! use lifeline_presence::prelude::*;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Re-export all crate preludes
pub use lifeline_capsule::prelude::*;
pub use lifeline_presence::prelude::*;
pub use lifeline_registry::prelude::*;
pub use lifeline_runtime::prelude::*;
pub use lifeline_telemetry::prelude::*;

// Configuration
pub use lifeline_config::{Config, ConfigError, ConfigResult};
