//! Lifeline Runtime - the root activation controller and its resource DSL.
//!
//! This crate provides:
//! - [`Lifeline`]: a root bound to a host's activate/deactivate callbacks,
//!   running registered handlers each inside their own top-level scope
//! - Providing ([`Lifeline::provides`]), watching
//!   ([`Lifeline::when_service_present`], [`Lifeline::when_services_present`],
//!   [`Lifeline::watch_services`]) and consuming ([`Lifeline::service`],
//!   [`Lifeline::with_service`]) resources by Rust type
//! - [`config_bridge`]: conversion from `lifeline-config` files
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lifeline_registry::InMemoryRegistry;
//! use lifeline_runtime::prelude::*;
//!
//! struct Database;
//! struct Cache;
//!
//! # fn main() -> RuntimeResult<()> {
//! let lifeline = Lifeline::new();
//! lifeline.when_active(|lifeline: &Lifeline| {
//!     lifeline.when_service_present::<Database, _>(|lifeline: &Lifeline, _db: Arc<Database>| {
//!         lifeline.provides(Cache)?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//!
//! let registry = InMemoryRegistry::new();
//! lifeline.on_activate(ActivationSignal::new("demo", Arc::new(registry.clone())))?;
//! assert!(lifeline.service::<Cache>()?.is_none());
//!
//! let database = lifeline.provides(Database)?;
//! assert!(lifeline.service::<Cache>()?.is_some());
//!
//! database.unregister()?;
//! assert!(lifeline.service::<Cache>()?.is_none());
//!
//! lifeline.on_deactivate()?;
//! assert!(registry.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config_bridge;
pub mod prelude;

mod config;
mod consuming;
mod error;
mod lifeline;
mod providing;
mod resource;
mod signal;
mod watching;

pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use lifeline::{Lifeline, RootHandler, WeakLifeline};
pub use resource::{ProvideOptions, ResourceSet, type_key};
pub use signal::ActivationSignal;
