//! Provider capsules tie a registry publication to a scope.

use std::fmt;
use std::sync::Arc;

use lifeline_capsule::{Capsule, CapsuleError, CapsuleResult};
use lifeline_registry::{Properties, Registration, Registry, RegistryError, Resource};
use parking_lot::Mutex;
use tracing::debug;

/// Publishes a resource on start and withdraws it on stop.
///
/// Stopping after the registration was already withdrawn elsewhere is not an
/// error.
pub struct ProviderCapsule {
    name: String,
    registry: Arc<dyn Registry>,
    resource: Resource,
    type_names: Vec<String>,
    properties: Properties,
    registration: Mutex<Option<Registration>>,
}

impl ProviderCapsule {
    /// Create a provider that has not published yet.
    pub fn new(
        registry: Arc<dyn Registry>,
        resource: Resource,
        type_names: Vec<String>,
        properties: Properties,
    ) -> Self {
        let name = format!("provider[{}]", type_names.join(","));
        Self {
            name,
            registry,
            resource,
            type_names,
            properties,
            registration: Mutex::new(None),
        }
    }

    /// The live registration, if started.
    #[must_use]
    pub fn registration(&self) -> Option<Registration> {
        self.registration.lock().clone()
    }
}

impl fmt::Debug for ProviderCapsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCapsule")
            .field("types", &self.type_names)
            .field("registration", &self.registration.lock().as_ref().map(Registration::id))
            .finish_non_exhaustive()
    }
}

impl Capsule for ProviderCapsule {
    fn start(&self) -> CapsuleResult<()> {
        let registration = self
            .registry
            .publish(
                Arc::clone(&self.resource),
                self.type_names.clone(),
                self.properties.clone(),
            )
            .map_err(|e| CapsuleError::other(e).context(format!("publishing {}", self.name)))?;
        debug!(provider = %self.name, resource_id = %registration.id(), "Resource provided");
        *self.registration.lock() = Some(registration);
        Ok(())
    }

    fn stop(&self) -> CapsuleResult<()> {
        let Some(registration) = self.registration.lock().take() else {
            return Ok(());
        };
        match registration.unregister() {
            Ok(()) => {
                debug!(provider = %self.name, resource_id = %registration.id(), "Resource withdrawn");
                Ok(())
            },
            Err(RegistryError::AlreadyUnregistered(id)) => {
                debug!(provider = %self.name, resource_id = %id, "Resource was already withdrawn");
                Ok(())
            },
            Err(e) => Err(CapsuleError::other(e).context(format!("withdrawing {}", self.name))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
