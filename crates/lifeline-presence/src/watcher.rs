//! Presence watchers: capsules that hold a registry subscription open.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use lifeline_capsule::{Capsule, CapsuleError, CapsuleResult};
use lifeline_registry::{
    BoxError, EventKind, Filter, Listener, Reference, Registry, Resource, ResourceEvent,
    Subscription,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Handler invoked for every event a watcher receives.
pub type WatchHandler = Arc<dyn Fn(&WatcherEvent) -> CapsuleResult<()> + Send + Sync>;

/// Metadata about the watcher that observed an event.
#[derive(Debug, Clone)]
pub struct WatcherContext {
    watcher: Arc<str>,
    filter: Arc<Filter>,
    reference: Reference,
}

impl WatcherContext {
    /// Name of the watcher.
    #[must_use]
    pub fn watcher(&self) -> &str {
        &self.watcher
    }

    /// The filter the watcher subscribed with.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Registry metadata of the resource.
    #[must_use]
    pub fn reference(&self) -> &Reference {
        &self.reference
    }
}

/// One event seen by a watcher.
#[derive(Clone)]
pub struct WatcherEvent {
    kind: EventKind,
    resource: Resource,
    context: WatcherContext,
}

impl WatcherEvent {
    /// What happened.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The resource object.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The resource as a concrete type, if it is one.
    #[must_use]
    pub fn downcast<S: Any + Send + Sync>(&self) -> Option<Arc<S>> {
        Arc::clone(&self.resource).downcast::<S>().ok()
    }

    /// Registry metadata of the resource.
    #[must_use]
    pub fn reference(&self) -> &Reference {
        &self.context.reference
    }

    /// Watcher metadata.
    #[must_use]
    pub fn context(&self) -> &WatcherContext {
        &self.context
    }
}

impl fmt::Debug for WatcherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherEvent")
            .field("kind", &self.kind)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A capsule that watches the registry while started.
///
/// `start` subscribes with the watcher's filter; the registry delivers one
/// ADDING per matching resource before `start` returns. `stop` closes the
/// subscription, after which no further events reach the handler. Both are
/// idempotent. After a REMOVED event the watcher releases its use of the
/// resource, whether or not the handler succeeded.
pub struct PresenceWatcher {
    name: Arc<str>,
    filter: Arc<Filter>,
    registry: Arc<dyn Registry>,
    handler: WatchHandler,
    subscription: Mutex<Option<Subscription>>,
}

impl PresenceWatcher {
    /// Create a stopped watcher.
    pub fn new(
        name: impl Into<String>,
        registry: Arc<dyn Registry>,
        filter: Filter,
        handler: WatchHandler,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            filter: Arc::new(filter),
            registry,
            handler,
            subscription: Mutex::new(None),
        }
    }

    /// The filter this watcher subscribes with.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Whether the subscription is open.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }
}

impl fmt::Debug for PresenceWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceWatcher")
            .field("name", &self.name)
            .field("filter", &self.filter.to_string())
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

impl Capsule for PresenceWatcher {
    fn start(&self) -> CapsuleResult<()> {
        if self.subscription.lock().is_some() {
            debug!(watcher = %self.name, "Watcher already started");
            return Ok(());
        }

        debug!(watcher = %self.name, filter = %self.filter, "Start watching resources");
        let listener = Arc::new(WatcherListener {
            name: Arc::clone(&self.name),
            filter: Arc::clone(&self.filter),
            registry: Arc::downgrade(&self.registry),
            handler: Arc::clone(&self.handler),
        });
        let subscription = self
            .registry
            .subscribe(Filter::clone(&self.filter), listener)
            .map_err(|e| {
                CapsuleError::other(e).context(format!("starting watcher '{}'", self.name))
            })?;

        let mut slot = self.subscription.lock();
        if slot.is_some() {
            subscription.close();
        } else {
            *slot = Some(subscription);
        }
        Ok(())
    }

    fn stop(&self) -> CapsuleResult<()> {
        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.close();
            debug!(watcher = %self.name, "Stop watching resources");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct WatcherListener {
    name: Arc<str>,
    filter: Arc<Filter>,
    registry: Weak<dyn Registry>,
    handler: WatchHandler,
}

impl Listener for WatcherListener {
    fn on_event(&self, event: &ResourceEvent) -> Result<(), BoxError> {
        let watcher_event = WatcherEvent {
            kind: event.kind(),
            resource: Arc::clone(event.resource()),
            context: WatcherContext {
                watcher: Arc::clone(&self.name),
                filter: Arc::clone(&self.filter),
                reference: event.reference().clone(),
            },
        };

        let _release = (event.kind() == EventKind::Removed).then(|| ReleaseOnDrop {
            registry: Weak::clone(&self.registry),
            reference: event.reference().clone(),
        });

        trace!(
            watcher = %self.name,
            kind = %event.kind(),
            resource_id = %event.reference().id(),
            "Watcher event"
        );
        (self.handler)(&watcher_event).map_err(BoxError::from)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Releases one use of a resource when dropped.
struct ReleaseOnDrop {
    registry: Weak<dyn Registry>,
    reference: Reference,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use lifeline_registry::{InMemoryRegistry, Properties, properties};
    use serde_json::Value;

    use super::*;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn recording_handler(journal: &Journal) -> WatchHandler {
        let journal = Arc::clone(journal);
        Arc::new(move |event: &WatcherEvent| {
            let value = event.downcast::<String>().map(|s| s.to_string()).unwrap_or_default();
            journal.lock().push(format!("{} {value}", event.kind()));
            Ok(())
        })
    }

    fn publish(registry: &InMemoryRegistry, value: &str, props: Properties) -> lifeline_registry::Registration {
        registry
            .publish(Arc::new(value.to_string()), vec!["Text".into()], props)
            .unwrap()
    }

    #[test]
    fn test_start_delivers_present_resources_and_stop_silences() {
        let registry = InMemoryRegistry::new();
        publish(&registry, "one", Properties::new());

        let journal = Journal::default();
        let watcher = PresenceWatcher::new(
            "texts",
            Arc::new(registry.clone()),
            Filter::object_class("Text"),
            recording_handler(&journal),
        );

        watcher.start().unwrap();
        assert!(watcher.is_watching());
        publish(&registry, "two", Properties::new());
        watcher.stop().unwrap();
        watcher.stop().unwrap();
        publish(&registry, "three", Properties::new());

        assert_eq!(*journal.lock(), vec!["ADDING one", "ADDING two"]);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_event_context_carries_filter_and_reference() {
        let registry = InMemoryRegistry::new();
        let seen: Arc<Mutex<Option<WatcherEvent>>> = Arc::default();
        let slot = Arc::clone(&seen);
        let watcher = PresenceWatcher::new(
            "ctx",
            Arc::new(registry.clone()),
            Filter::for_type("Text", Some("(lang=en)")).unwrap(),
            Arc::new(move |event: &WatcherEvent| {
                *slot.lock() = Some(event.clone());
                Ok(())
            }),
        );
        watcher.start().unwrap();
        publish(&registry, "hi", properties([("lang", "en")]));

        let event = seen.lock().clone().unwrap();
        assert_eq!(event.kind(), EventKind::Adding);
        assert_eq!(event.context().watcher(), "ctx");
        assert_eq!(event.context().filter().to_string(), "(&(objectClass=Text)(lang=en))");
        assert_eq!(event.reference().property("lang"), Some(&Value::from("en")));
        assert!(event.downcast::<u32>().is_none());
    }

    #[test]
    fn test_removed_releases_even_when_handler_fails() {
        let registry = InMemoryRegistry::new();
        let reg = publish(&registry, "x", properties([("lang", "en")]));

        let watcher = PresenceWatcher::new(
            "strict",
            Arc::new(registry.clone()),
            Filter::parse("(lang=en)").unwrap(),
            Arc::new(|event: &WatcherEvent| match event.kind() {
                EventKind::Removed => Err(CapsuleError::msg("cleanup failed")),
                _ => Ok(()),
            }),
        );
        watcher.start().unwrap();
        assert_eq!(registry.use_count(reg.id()), Some(1));

        // Stops matching but stays published, so the use count is observable.
        reg.set_properties(properties([("lang", "de")])).unwrap();
        assert_eq!(registry.use_count(reg.id()), Some(0));
    }

    #[test]
    fn test_failed_initial_event_fails_start() {
        let registry = InMemoryRegistry::new();
        publish(&registry, "x", Properties::new());

        let watcher = PresenceWatcher::new(
            "picky",
            Arc::new(registry.clone()),
            Filter::object_class("Text"),
            Arc::new(|_: &WatcherEvent| Err(CapsuleError::msg("rejected"))),
        );

        let err = watcher.start().unwrap_err();
        assert!(err.to_string().contains("starting watcher 'picky'"));
        assert!(!watcher.is_watching());
        assert_eq!(registry.subscription_count(), 0);
    }
}
