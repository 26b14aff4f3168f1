//! Publishing resources for the lifetime of the open scope.

use std::any::Any;
use std::sync::Arc;

use lifeline_capsule::{Capsule, CapsuleError};
use lifeline_presence::ProviderCapsule;
use lifeline_registry::Registration;

use crate::error::RuntimeResult;
use crate::lifeline::Lifeline;
use crate::resource::{ProvideOptions, type_key};

impl Lifeline {
    /// Publish `resource` under its type name until the open scope stops.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or the registry's refusal.
    pub fn provides<S: Any + Send + Sync>(&self, resource: S) -> RuntimeResult<Registration> {
        self.provides_with(resource, ProvideOptions::new())
    }

    /// Publish `resource` under its type name plus `options.types`, with
    /// `options.properties`, until the open scope stops.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or the registry's refusal.
    pub fn provides_with<S: Any + Send + Sync>(
        &self,
        resource: S,
        options: ProvideOptions,
    ) -> RuntimeResult<Registration> {
        let registry = self.require_registry("provide a resource")?;

        let mut types = vec![type_key::<S>()];
        for extra in options.types {
            if !types.contains(&extra) {
                types.push(extra);
            }
        }

        let provider = Arc::new(ProviderCapsule::new(
            registry,
            Arc::new(resource),
            types,
            options.properties,
        ));
        self.add_capsule(Arc::clone(&provider) as Arc<dyn Capsule>)?;

        provider.registration().ok_or_else(|| {
            CapsuleError::msg(format!("{} was stopped while being provided", provider.name())).into()
        })
    }
}
