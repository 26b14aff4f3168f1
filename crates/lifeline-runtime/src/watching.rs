//! Reacting to resources: raw watchers and presence-gated blocks.

use std::any::Any;
use std::sync::Arc;

use lifeline_capsule::{Capsule, CapsuleError, CapsuleResult};
use lifeline_presence::{
    AllPresentBlock, PresenceBlock, PresenceGate, PresenceWatcher, WatchHandler, WatcherEvent,
    require_all, when_present,
};
use lifeline_registry::Filter;

use crate::error::RuntimeResult;
use crate::lifeline::Lifeline;
use crate::resource::{ResourceSet, type_key};

impl Lifeline {
    /// Receive every event for resources of type `S` matching `query`, while
    /// the open scope is running.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, a registry error for a malformed `query`, or the handler's
    /// failure on the initial events.
    pub fn watch_services<S, F>(
        &self,
        query: Option<&str>,
        handler: F,
    ) -> RuntimeResult<Arc<PresenceWatcher>>
    where
        S: ?Sized + 'static,
        F: Fn(&Lifeline, &WatcherEvent) -> CapsuleResult<()> + Send + Sync + 'static,
    {
        let registry = self.require_registry("watch resources")?;
        let filter = Filter::for_type(type_key::<S>(), query)?;

        let weak = self.downgrade();
        let handler: WatchHandler = Arc::new(move |event: &WatcherEvent| {
            let lifeline = weak.require("deliver a resource event")?;
            handler(&lifeline, event)
        });

        let watcher = Arc::new(PresenceWatcher::new(
            format!("watch {filter}"),
            registry,
            filter,
            handler,
        ));
        self.add_capsule(Arc::clone(&watcher) as Arc<dyn Capsule>)?;
        Ok(watcher)
    }

    /// Run `block` while a resource of type `S` is present.
    ///
    /// The first resource to appear wins; capsules added by `block` stop when
    /// that resource is removed.
    ///
    /// # Errors
    ///
    /// See [`when_advanced_service_present`](Self::when_advanced_service_present).
    pub fn when_service_present<S, F>(&self, block: F) -> RuntimeResult<Arc<PresenceGate>>
    where
        S: Any + Send + Sync,
        F: Fn(&Lifeline, Arc<S>) -> CapsuleResult<()> + Send + Sync + 'static,
    {
        self.when_advanced_service_present::<S, F>(None, block)
    }

    /// Run `block` while a resource of type `S` matching `query` is present.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, a registry error for a malformed `query`, or the block's
    /// failure if a matching resource was already present.
    pub fn when_advanced_service_present<S, F>(
        &self,
        query: Option<&str>,
        block: F,
    ) -> RuntimeResult<Arc<PresenceGate>>
    where
        S: Any + Send + Sync,
        F: Fn(&Lifeline, Arc<S>) -> CapsuleResult<()> + Send + Sync + 'static,
    {
        let registry = self.require_registry("wait for a resource")?;
        let filter = Filter::for_type(type_key::<S>(), query)?;

        let weak = self.downgrade();
        let block: PresenceBlock = Arc::new(move |event: &WatcherEvent| {
            let lifeline = weak.require("activate a presence block")?;
            block(&lifeline, downcast_event::<S>(event)?)
        });

        let name = format!("when present {filter}");
        Ok(when_present(&self.context(), &registry, name, filter, block)?)
    }

    /// Run `block` while one resource of every type in `T` is present.
    ///
    /// Resources are acquired in tuple order; removing the one bound for an
    /// earlier type tears down everything acquired after it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or the block's failure if all resources were already
    /// present.
    pub fn when_services_present<T, F>(&self, block: F) -> RuntimeResult<Arc<PresenceGate>>
    where
        T: ResourceSet,
        F: Fn(&Lifeline, T::Resources) -> CapsuleResult<()> + Send + Sync + 'static,
    {
        let registry = self.require_registry("wait for resources")?;
        let type_names = T::type_names();
        let name = format!("when present ({})", type_names.join(", "));
        let filters: Vec<Filter> = type_names.into_iter().map(Filter::object_class).collect();

        let weak = self.downgrade();
        let block: AllPresentBlock = Arc::new(move |events: &[WatcherEvent]| {
            let lifeline = weak.require("activate a presence block")?;
            let resources = T::from_events(events).ok_or_else(|| {
                CapsuleError::msg(format!(
                    "resources do not match ({})",
                    T::type_names().join(", ")
                ))
            })?;
            block(&lifeline, resources)
        });

        Ok(require_all(&self.context(), &registry, &name, filters, block)?)
    }
}

fn downcast_event<S: Any + Send + Sync>(event: &WatcherEvent) -> CapsuleResult<Arc<S>> {
    event.downcast::<S>().ok_or_else(|| {
        CapsuleError::msg(format!(
            "resource {} is not a {}",
            event.reference().id(),
            type_key::<S>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use lifeline_registry::{InMemoryRegistry, Properties, Registration, Registry, properties};
    use lifeline_test::EventLog;
    use lifeline_test::fixtures::{Greeter, Store};

    use super::*;
    use crate::signal::ActivationSignal;

    fn publish<S: Any + Send + Sync>(registry: &InMemoryRegistry, resource: S, props: Properties) -> Registration {
        registry
            .publish(Arc::new(resource), vec![type_key::<S>()], props)
            .unwrap()
    }

    fn active(registry: &InMemoryRegistry, handler: impl Fn(&Lifeline) -> CapsuleResult<()> + Send + Sync + 'static) -> Lifeline {
        let lifeline = Lifeline::new();
        lifeline.when_active(handler).unwrap();
        lifeline
            .on_activate(ActivationSignal::new("w", Arc::new(registry.clone())))
            .unwrap();
        lifeline
    }

    #[test]
    fn test_when_service_present_first_wins_and_exact_teardown() {
        let registry = InMemoryRegistry::new();
        let log = EventLog::new();
        let block_log = log.clone();
        let _lifeline = active(&registry, move |lifeline: &Lifeline| {
            let log = block_log.clone();
            lifeline.when_service_present::<Greeter, _>(move |lifeline: &Lifeline, greeter: Arc<Greeter>| {
                log.push(format!("up {}", greeter.greeting()));
                let log = log.clone();
                let word = greeter.greeting().to_string();
                lifeline.on_stop(move || {
                    log.push(format!("down {word}"));
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        });

        let a = publish(&registry, Greeter::new("a"), Properties::new());
        let b = publish(&registry, Greeter::new("b"), Properties::new());
        b.unregister().unwrap();
        assert_eq!(log.entries(), vec!["up a"]);
        a.unregister().unwrap();
        assert_eq!(log.entries(), vec!["up a", "down a"]);
    }

    #[test]
    fn test_advanced_query_filters_resources() {
        let registry = InMemoryRegistry::new();
        let log = EventLog::new();
        let block_log = log.clone();
        let _lifeline = active(&registry, move |lifeline: &Lifeline| {
            let log = block_log.clone();
            lifeline.when_advanced_service_present::<Greeter, _>(Some("(lang=fr)"), move |_, greeter: Arc<Greeter>| {
                log.push(greeter.greeting());
                Ok(())
            })?;
            Ok(())
        });

        publish(&registry, Greeter::new("hello"), properties([("lang", "en")]));
        publish(&registry, Greeter::new("bonjour"), properties([("lang", "fr")]));
        assert_eq!(log.entries(), vec!["bonjour"]);
    }

    #[test]
    fn test_malformed_query_is_a_registry_error() {
        let registry = InMemoryRegistry::new();
        let lifeline = active(&registry, |_| Ok(()));
        let err = lifeline
            .when_advanced_service_present::<Greeter, _>(Some("(lang=fr"), |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, crate::RuntimeError::Registry(_)));
    }

    #[test]
    fn test_when_services_present_hands_over_typed_tuple() {
        let registry = InMemoryRegistry::new();
        let log = EventLog::new();
        let block_log = log.clone();
        let _lifeline = active(&registry, move |lifeline: &Lifeline| {
            let log = block_log.clone();
            lifeline.when_services_present::<(Greeter, Store), _>(move |_, (greeter, store): (Arc<Greeter>, Arc<Store>)| {
                log.push(format!("{} {}", greeter.greeting(), store.name()));
                Ok(())
            })?;
            Ok(())
        });

        publish(&registry, Store::new("cellar"), Properties::new());
        assert!(log.is_empty());
        publish(&registry, Greeter::new("hi"), Properties::new());
        assert_eq!(log.entries(), vec!["hi cellar"]);
    }

    #[test]
    fn test_watch_services_sees_all_kinds() {
        let registry = InMemoryRegistry::new();
        let log = EventLog::new();
        let watch_log = log.clone();
        let lifeline = active(&registry, move |lifeline: &Lifeline| {
            let log = watch_log.clone();
            lifeline.watch_services::<Greeter, _>(None, move |_, event: &WatcherEvent| {
                log.push(event.kind().to_string());
                Ok(())
            })?;
            Ok(())
        });

        let reg = publish(&registry, Greeter::new("x"), Properties::new());
        reg.set_properties(properties([("lang", "en")])).unwrap();
        reg.unregister().unwrap();
        assert_eq!(log.entries(), vec!["ADDING", "MODIFIED", "REMOVED"]);

        lifeline.on_deactivate().unwrap();
        assert_eq!(registry.subscription_count(), 0);
    }
}
