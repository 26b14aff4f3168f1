//! Prelude module - commonly used test utilities.
//!
//! Use `use lifeline_test::prelude::*;` in test modules.

// Capsules
pub use crate::{FailingCapsule, RecordingCapsule};

// Recording
pub use crate::EventLog;

// Fixtures
pub use crate::{Greeter, Store};

// Logging
pub use crate::{init_test_logging, setup_test_logging};
