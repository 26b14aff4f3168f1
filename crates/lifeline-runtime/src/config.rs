//! Runtime configuration.

use lifeline_capsule::StopPolicy;
use serde::{Deserialize, Serialize};

/// Settings of one [`Lifeline`](crate::Lifeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Root name used in logs. The activation signal carries its own name.
    pub name: String,
    /// Stop policy of every scope the root opens.
    pub stop_policy: StopPolicy,
    /// Warn when activating with no handlers registered.
    pub warn_without_handlers: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "lifeline".to_string(),
            stop_policy: StopPolicy::default(),
            warn_without_handlers: true,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the scope stop policy.
    #[must_use]
    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    /// Do not warn about activation without handlers.
    #[must_use]
    pub fn without_handler_warning(mut self) -> Self {
        self.warn_without_handlers = false;
        self
    }
}
