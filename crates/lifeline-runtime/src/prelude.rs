//! Prelude module - commonly used types for convenient import.
//!
//! Use `use lifeline_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{RuntimeError, RuntimeResult};

// Root controller
pub use crate::{ActivationSignal, Lifeline, RootHandler, RuntimeConfig, WeakLifeline};

// Resource DSL
pub use crate::{ProvideOptions, ResourceSet, type_key};

// Capsule results used by handlers
pub use lifeline_capsule::{CapsuleError, CapsuleResult};
