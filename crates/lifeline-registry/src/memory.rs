//! In-memory reference registry.
//!
//! Every subscription owns a mailbox. Registry mutations enqueue events into
//! the mailboxes of affected subscriptions while holding the registry lock, so
//! each subscription observes changes in mutation order. Mailboxes are drained
//! outside the lock by exactly one thread at a time: if a listener triggers a
//! change that concerns its own subscription, or another thread is already
//! draining, the event waits in the queue and the current drainer delivers it
//! after the running `on_event` returns.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{BoxError, RegistryError, RegistryResult};
use crate::event::{EventKind, Listener, ResourceEvent};
use crate::filter::Filter;
use crate::reference::{Properties, Reference, Resource, ResourceId};
use crate::registry::{
    Registration, RegistrationControl, Registry, Subscription, SubscriptionControl,
    SubscriptionId,
};

/// A thread-safe registry held entirely in memory.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct InMemoryRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<ResourceId, Entry>,
    subscriptions: Vec<Watch>,
}

struct Entry {
    reference: Reference,
    resource: Resource,
    use_count: usize,
}

struct Watch {
    id: SubscriptionId,
    filter: Filter,
    tracked: BTreeSet<ResourceId>,
    mailbox: Arc<Mailbox>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Number of published resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().resources.len()
    }

    /// Whether nothing is published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().resources.is_empty()
    }

    /// Number of open subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Outstanding uses of a published resource.
    ///
    /// A subscription that is delivered ADDING holds one use until the
    /// resource is released or the subscription closes.
    #[must_use]
    pub fn use_count(&self, id: ResourceId) -> Option<usize> {
        self.inner
            .state
            .lock()
            .resources
            .get(&id)
            .map(|entry| entry.use_count)
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("InMemoryRegistry")
            .field("resources", &state.resources.len())
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

impl Registry for InMemoryRegistry {
    fn publish(
        &self,
        resource: Resource,
        type_names: Vec<String>,
        properties: Properties,
    ) -> RegistryResult<Registration> {
        let id = ResourceId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let reference = Reference::new(id, type_names, properties);

        let affected = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let mut affected = Vec::new();
            for watch in &mut state.subscriptions {
                if watch.filter.matches(reference.properties()) {
                    watch.tracked.insert(id);
                    watch.mailbox.push(ResourceEvent::new(
                        EventKind::Adding,
                        reference.clone(),
                        Arc::clone(&resource),
                    ));
                    affected.push(Arc::clone(&watch.mailbox));
                }
            }
            state.resources.insert(
                id,
                Entry {
                    reference: reference.clone(),
                    resource,
                    use_count: affected.len(),
                },
            );
            affected
        };

        debug!(
            resource_id = %id,
            types = ?reference.type_names(),
            watchers = affected.len(),
            "Resource published"
        );
        deliver_all(&affected, "publish");

        Ok(Registration::new(
            id,
            Arc::new(PublicationHandle {
                id,
                registry: Arc::downgrade(&self.inner),
            }),
        ))
    }

    fn subscribe(
        &self,
        filter: Filter,
        listener: Arc<dyn Listener>,
    ) -> RegistryResult<Subscription> {
        let id = SubscriptionId::new();
        let listener_name = listener.name().to_string();
        let filter_text = filter.to_string();
        let mailbox = Arc::new(Mailbox::claimed(listener));

        let initial = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let mut matching: Vec<&mut Entry> = state
                .resources
                .values_mut()
                .filter(|entry| filter.matches(entry.reference.properties()))
                .collect();
            matching.sort_by(|a, b| a.reference.preference(&b.reference));

            let mut tracked = BTreeSet::new();
            for entry in matching {
                entry.use_count = entry.use_count.saturating_add(1);
                tracked.insert(entry.reference.id());
                mailbox.push(ResourceEvent::new(
                    EventKind::Adding,
                    entry.reference.clone(),
                    Arc::clone(&entry.resource),
                ));
            }
            let initial = tracked.len();
            state.subscriptions.push(Watch {
                id,
                filter,
                tracked,
                mailbox: Arc::clone(&mailbox),
            });
            initial
        };

        debug!(
            subscription_id = %id,
            listener = %listener_name,
            filter = %filter_text,
            initial,
            "Subscription opened"
        );

        let failures = mailbox.drain_claimed();
        if let Some(first) = failures.into_iter().next() {
            self.inner.close_subscription(id);
            return Err(RegistryError::Listener {
                listener: listener_name,
                source: first,
            });
        }

        Ok(Subscription::new(
            id,
            Arc::new(SubscriptionHandle {
                id,
                registry: Arc::downgrade(&self.inner),
                mailbox,
            }),
        ))
    }

    fn references(&self, filter: Option<&Filter>) -> Vec<Reference> {
        let state = self.inner.state.lock();
        let mut references: Vec<Reference> = state
            .resources
            .values()
            .filter(|entry| filter.is_none_or(|f| f.matches(entry.reference.properties())))
            .map(|entry| entry.reference.clone())
            .collect();
        references.sort_by(Reference::preference);
        references
    }

    fn get(&self, reference: &Reference) -> Option<Resource> {
        let mut state = self.inner.state.lock();
        let entry = state.resources.get_mut(&reference.id())?;
        entry.use_count = entry.use_count.saturating_add(1);
        Some(Arc::clone(&entry.resource))
    }

    fn release(&self, reference: &Reference) -> bool {
        let mut state = self.inner.state.lock();
        match state.resources.get_mut(&reference.id()) {
            Some(entry) if entry.use_count > 0 => {
                entry.use_count = entry.use_count.saturating_sub(1);
                true
            },
            _ => false,
        }
    }
}

impl Inner {
    fn unregister(&self, id: ResourceId) -> RegistryResult<()> {
        let affected = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let entry = state
                .resources
                .remove(&id)
                .ok_or(RegistryError::AlreadyUnregistered(id))?;

            let mut affected = Vec::new();
            for watch in &mut state.subscriptions {
                if watch.tracked.remove(&id) {
                    watch.mailbox.push(ResourceEvent::new(
                        EventKind::Removed,
                        entry.reference.clone(),
                        Arc::clone(&entry.resource),
                    ));
                    affected.push(Arc::clone(&watch.mailbox));
                }
            }
            affected
        };

        debug!(resource_id = %id, watchers = affected.len(), "Resource unregistered");
        deliver_all(&affected, "unregister");
        Ok(())
    }

    fn set_properties(&self, id: ResourceId, properties: Properties) -> RegistryResult<()> {
        let affected = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let entry = state
                .resources
                .get_mut(&id)
                .ok_or(RegistryError::AlreadyUnregistered(id))?;
            entry.reference = entry.reference.with_properties(properties);

            let mut affected = Vec::new();
            for watch in &mut state.subscriptions {
                let was = watch.tracked.contains(&id);
                let now = watch.filter.matches(entry.reference.properties());
                let kind = match (was, now) {
                    (true, true) => EventKind::Modified,
                    (true, false) => {
                        watch.tracked.remove(&id);
                        EventKind::Removed
                    },
                    (false, true) => {
                        watch.tracked.insert(id);
                        entry.use_count = entry.use_count.saturating_add(1);
                        EventKind::Adding
                    },
                    (false, false) => continue,
                };
                watch.mailbox.push(ResourceEvent::new(
                    kind,
                    entry.reference.clone(),
                    Arc::clone(&entry.resource),
                ));
                affected.push(Arc::clone(&watch.mailbox));
            }
            affected
        };

        debug!(resource_id = %id, watchers = affected.len(), "Resource properties modified");
        deliver_all(&affected, "modify");
        Ok(())
    }

    fn close_subscription(&self, id: SubscriptionId) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(position) = state.subscriptions.iter().position(|w| w.id == id) else {
            return false;
        };
        let watch = state.subscriptions.remove(position);
        // A REMOVED still in the mailbox stands for a use the listener will
        // never get to release.
        let undelivered_removals: Vec<ResourceId> = watch
            .mailbox
            .close()
            .iter()
            .filter(|event| event.kind() == EventKind::Removed)
            .map(|event| event.reference().id())
            .collect();
        for resource_id in watch.tracked.iter().chain(&undelivered_removals) {
            if let Some(entry) = state.resources.get_mut(resource_id) {
                entry.use_count = entry.use_count.saturating_sub(1);
            }
        }
        debug!(
            subscription_id = %id,
            undelivered_removals = undelivered_removals.len(),
            "Subscription closed"
        );
        true
    }

    fn reference(&self, id: ResourceId) -> Option<Reference> {
        self.state
            .lock()
            .resources
            .get(&id)
            .map(|entry| entry.reference.clone())
    }
}

fn deliver_all(mailboxes: &[Arc<Mailbox>], operation: &'static str) {
    for mailbox in mailboxes {
        for error in mailbox.deliver() {
            warn!(
                listener = %mailbox.listener.name(),
                operation,
                error = %error,
                "Listener failed during event delivery"
            );
        }
    }
}

struct Mailbox {
    listener: Arc<dyn Listener>,
    state: Mutex<MailboxState>,
}

#[derive(Default)]
struct MailboxState {
    pending: VecDeque<ResourceEvent>,
    draining: bool,
    closed: bool,
}

impl Mailbox {
    /// A mailbox already claimed for draining by the creating thread.
    fn claimed(listener: Arc<dyn Listener>) -> Self {
        Self {
            listener,
            state: Mutex::new(MailboxState {
                draining: true,
                ..MailboxState::default()
            }),
        }
    }

    fn push(&self, event: ResourceEvent) {
        let mut state = self.state.lock();
        if !state.closed {
            state.pending.push_back(event);
        }
    }

    /// Close and hand back the events that will never be delivered.
    fn close(&self) -> Vec<ResourceEvent> {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.drain(..).collect()
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Drain unless another frame or thread already is.
    fn deliver(&self) -> Vec<BoxError> {
        {
            let mut state = self.state.lock();
            if state.draining || state.closed {
                return Vec::new();
            }
            state.draining = true;
        }
        self.drain_claimed()
    }

    fn drain_claimed(&self) -> Vec<BoxError> {
        let mut failures = Vec::new();
        loop {
            let event = {
                let mut state = self.state.lock();
                let next = if state.closed {
                    None
                } else {
                    state.pending.pop_front()
                };
                match next {
                    Some(event) => event,
                    None => {
                        state.pending.clear();
                        state.draining = false;
                        break;
                    },
                }
            };

            trace!(
                listener = %self.listener.name(),
                kind = %event.kind(),
                resource_id = %event.reference().id(),
                "Delivering event"
            );

            let outcome = catch_unwind(AssertUnwindSafe(|| self.listener.on_event(&event)));
            match outcome {
                Ok(Ok(())) => {},
                Ok(Err(e)) => failures.push(e),
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(listener = %self.listener.name(), panic = %message, "Listener panicked");
                    failures.push(format!("listener panicked: {message}").into());
                },
            }
        }
        failures
    }
}

struct PublicationHandle {
    id: ResourceId,
    registry: Weak<Inner>,
}

impl PublicationHandle {
    fn registry(&self) -> RegistryResult<Arc<Inner>> {
        self.registry.upgrade().ok_or(RegistryError::Closed)
    }
}

impl RegistrationControl for PublicationHandle {
    fn unregister(&self) -> RegistryResult<()> {
        self.registry()?.unregister(self.id)
    }

    fn set_properties(&self, properties: Properties) -> RegistryResult<()> {
        self.registry()?.set_properties(self.id, properties)
    }

    fn reference(&self) -> Option<Reference> {
        self.registry.upgrade()?.reference(self.id)
    }
}

struct SubscriptionHandle {
    id: SubscriptionId,
    registry: Weak<Inner>,
    mailbox: Arc<Mailbox>,
}

impl SubscriptionControl for SubscriptionHandle {
    fn close(&self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => inner.close_subscription(self.id),
            None => {
                let was_open = !self.mailbox.is_closed();
                drop(self.mailbox.close());
                was_open
            },
        }
    }

    fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}
