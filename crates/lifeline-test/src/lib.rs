//! Lifeline Test - shared test utilities for Lifeline crates.
//!
//! This crate provides recording and failing capsules, an ordered event log,
//! resource fixtures and test logging setup. Use it as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! lifeline-test.workspace = true
//! ```
//!
//! ```rust
//! use std::sync::Arc;
//! use lifeline_capsule::prelude::*;
//! use lifeline_test::{EventLog, RecordingCapsule};
//!
//! let log = EventLog::new();
//! let ctx = DynamicCapsuleContext::new();
//! let scope = ctx
//!     .execute_within_new_capsule_scope(|| ctx.add_capsule(Arc::new(RecordingCapsule::new("db", &log))))
//!     .unwrap();
//! scope.stop().unwrap();
//! assert_eq!(log.entries(), vec!["start db", "stop db"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod capsules;
pub mod fixtures;
pub mod harness;
pub mod log;

pub use capsules::*;
pub use fixtures::*;
pub use harness::*;
pub use log::*;
