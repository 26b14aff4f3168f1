//! Prelude module - commonly used types for convenient import.
//!
//! Use `use lifeline_registry::prelude::*;` to import all essential types.

// Errors
pub use crate::{RegistryError, RegistryResult};

// References and filters
pub use crate::{Filter, Properties, Reference, Resource, ResourceId, properties};

// Events
pub use crate::{EventKind, FnListener, Listener, ResourceEvent};

// Registries
pub use crate::{InMemoryRegistry, Registration, Registry, Subscription};
