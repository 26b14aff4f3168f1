//! Lifeline Registry - the dynamic resource registry boundary.
//!
//! This crate provides:
//! - [`Reference`], [`Properties`] and [`ResourceId`]: metadata of published
//!   resources
//! - [`Filter`]: an LDAP-style filter language over properties
//! - [`Registry`] and [`Listener`]: the traits presence watching is built on
//! - [`InMemoryRegistry`]: a thread-safe registry with per-subscription
//!   ordered, non-overlapping event delivery
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lifeline_registry::prelude::*;
//!
//! # fn main() -> RegistryResult<()> {
//! let registry = InMemoryRegistry::new();
//! let listener = Arc::new(FnListener::new("printer", |event: &ResourceEvent| {
//!     println!("{} {}", event.kind(), event.reference().id());
//!     Ok(())
//! }));
//! let subscription = registry.subscribe(Filter::parse("(objectClass=Clock)")?, listener)?;
//!
//! let registration = registry.publish(
//!     Arc::new(42_u64),
//!     vec!["Clock".to_string()],
//!     properties([("zone", "utc")]),
//! )?;
//! registration.unregister()?;
//! subscription.close();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod event;
mod filter;
mod memory;
mod reference;
mod registry;

pub use error::{BoxError, RegistryError, RegistryResult};
pub use event::{EventKind, FnListener, Listener, ResourceEvent};
pub use filter::Filter;
pub use memory::InMemoryRegistry;
pub use reference::{
    OBJECT_CLASS, Properties, RESOURCE_ID, RESOURCE_RANKING, Reference, Resource, ResourceId,
    properties,
};
pub use registry::{
    Registration, RegistrationControl, Registry, Subscription, SubscriptionControl,
    SubscriptionId,
};
