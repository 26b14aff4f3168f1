//! Lifeline Capsule - lifecycle units and the scopes that stop them.
//!
//! This crate provides:
//! - The [`Capsule`] trait: a unit with a synchronous `start` and `stop`
//! - [`CapsuleScope`]: an immutable, ordered stop-group of started capsules
//! - [`CapsuleContext`]: routes started capsules into the scope that is open
//!   on the calling thread, and opens new scopes
//! - [`DynamicVariable`]: the stack-disciplined, thread-inheritable cell the
//!   context keeps its open scope in
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lifeline_capsule::prelude::*;
//!
//! # fn main() -> CapsuleResult<()> {
//! let ctx = DynamicCapsuleContext::new();
//!
//! let scope = ctx
//!     .execute_within_new_capsule_scope(|| {
//!         ctx.add_capsule(Arc::new(FnCapsule::on_stop("cleanup", || {
//!             tracing::info!("cleaning up");
//!             Ok(())
//!         })))
//!     })
//!     .map_err(ScopeError::stop_scope)?;
//!
//! assert_eq!(scope.len(), 1);
//! scope.stop()?;
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

mod capsule;
mod context;
mod dynamic;
mod error;
mod scope;

pub use capsule::{Capsule, CapsuleAction, FnCapsule};
pub use context::{
    CapsuleContext, CapsuleContextExt, DynamicCapsuleContext, ScopeBlock, ScopeError,
};
pub use dynamic::{DynamicVariable, InheritedBindings, spawn, spawn_with};
pub use error::{BoxError, CapsuleError, CapsuleResult};
pub use scope::{CapsuleScope, StopPolicy};
