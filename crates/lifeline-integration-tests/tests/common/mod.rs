//! Shared test harness for integration tests.

use std::any::Any;
use std::sync::Arc;

use lifeline_capsule::CapsuleResult;
use lifeline_registry::{InMemoryRegistry, Properties, Registration, Registry};
use lifeline_runtime::{ActivationSignal, Lifeline, RuntimeConfig, type_key};
use lifeline_test::{EventLog, init_test_logging};

/// A root wired to an in-memory registry.
#[allow(dead_code)]
pub struct Harness {
    /// The registry handed over on activation.
    pub registry: InMemoryRegistry,
    /// The root under test.
    pub lifeline: Lifeline,
    /// Observations made by handlers.
    pub log: EventLog,
}

#[allow(dead_code)]
impl Harness {
    /// Inactive root with default settings.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::new("it"))
    }

    /// Inactive root with `config`.
    pub fn with_config(config: RuntimeConfig) -> Self {
        init_test_logging();
        Self {
            registry: InMemoryRegistry::new(),
            lifeline: Lifeline::with_config(config),
            log: EventLog::new(),
        }
    }

    /// Register a root handler.
    pub fn when_active<F>(&self, handler: F)
    where
        F: Fn(&Lifeline) -> CapsuleResult<()> + Send + Sync + 'static,
    {
        self.lifeline.when_active(handler).unwrap();
    }

    /// Activate with this harness' registry.
    pub fn activate(&self) {
        self.lifeline
            .on_activate(ActivationSignal::new("it", Arc::new(self.registry.clone())))
            .unwrap();
    }

    /// Deactivate, expecting success.
    pub fn deactivate(&self) {
        self.lifeline.on_deactivate().unwrap();
    }

    /// Publish `resource` under its type name, outside of any scope.
    pub fn publish<S: Any + Send + Sync>(&self, resource: S) -> Registration {
        self.publish_with(resource, Properties::new())
    }

    /// Publish `resource` under its type name with `properties`.
    pub fn publish_with<S: Any + Send + Sync>(&self, resource: S, properties: Properties) -> Registration {
        self.registry
            .publish(Arc::new(resource), vec![type_key::<S>()], properties)
            .unwrap()
    }

    /// How many resources of type `S` are published.
    pub fn count<S: ?Sized + 'static>(&self) -> usize {
        let filter = lifeline_registry::Filter::object_class(type_key::<S>());
        self.registry.references(Some(&filter)).len()
    }
}
