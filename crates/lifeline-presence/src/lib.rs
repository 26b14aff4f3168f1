//! Lifeline Presence - lifecycle driven by registry presence events.
//!
//! This crate provides:
//! - [`PresenceWatcher`]: a capsule holding a registry subscription open
//! - [`PresenceGate`]: runs a block in its own scope while one matching
//!   resource is present, first come first served
//! - [`require_all`]: nests gates so a block runs only while a resource for
//!   every filter is present
//! - [`ProviderCapsule`]: publishes a resource for the lifetime of a scope
//!
//! Gates and watchers are capsules: register them with a
//! [`CapsuleContext`](lifeline_capsule::CapsuleContext) and they stop with
//! the scope they were registered in.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod compose;
mod gate;
mod provider;
mod watcher;

pub use compose::{AllPresentBlock, require_all};
pub use gate::{PresenceBlock, PresenceGate, when_present};
pub use provider::ProviderCapsule;
pub use watcher::{PresenceWatcher, WatchHandler, WatcherContext, WatcherEvent};
