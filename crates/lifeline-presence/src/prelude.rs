//! Prelude module - commonly used types for convenient import.
//!
//! Use `use lifeline_presence::prelude::*;` to import all essential types.

// Watching
pub use crate::{PresenceWatcher, WatchHandler, WatcherContext, WatcherEvent};

// Gated activation
pub use crate::{AllPresentBlock, PresenceBlock, PresenceGate, require_all, when_present};

// Providing
pub use crate::ProviderCapsule;
