//! Prelude module - commonly used types for convenient import.
//!
//! Use `use lifeline_capsule::prelude::*;` to import all essential types.

// Errors
pub use crate::{BoxError, CapsuleError, CapsuleResult};

// Capsules
pub use crate::{Capsule, FnCapsule};

// Scopes and contexts
pub use crate::{
    CapsuleContext, CapsuleContextExt, CapsuleScope, DynamicCapsuleContext, ScopeError,
    StopPolicy,
};

// Dynamic scoping
pub use crate::{DynamicVariable, InheritedBindings};
