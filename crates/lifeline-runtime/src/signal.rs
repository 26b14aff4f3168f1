//! The activation signal handed over by the host.

use std::fmt;
use std::sync::Arc;

use lifeline_registry::Registry;

/// What a root is activated with: a name for diagnostics and the registry its
/// handlers publish to and watch.
#[derive(Clone)]
pub struct ActivationSignal {
    name: String,
    registry: Arc<dyn Registry>,
}

impl ActivationSignal {
    /// Create a signal.
    pub fn new(name: impl Into<String>, registry: Arc<dyn Registry>) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    /// Name of the activation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry of this activation.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }
}

impl fmt::Debug for ActivationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationSignal")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
