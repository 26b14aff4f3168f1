//! The registry boundary: publication, subscription, lookup.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::RegistryResult;
use crate::event::Listener;
use crate::filter::Filter;
use crate::reference::{Properties, Reference, Resource, ResourceId};

/// A dynamic registry of published resources.
pub trait Registry: Send + Sync {
    /// Publish `resource` under `type_names` with `properties`.
    ///
    /// Matching subscriptions receive an ADDING event.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry refuses the publication.
    fn publish(
        &self,
        resource: Resource,
        type_names: Vec<String>,
        properties: Properties,
    ) -> RegistryResult<Registration>;

    /// Subscribe `listener` to resources matching `filter`.
    ///
    /// One ADDING event per currently matching resource is delivered before
    /// this returns.
    ///
    /// # Errors
    ///
    /// If the listener fails during that initial delivery, the subscription
    /// is closed again and the failure returned.
    fn subscribe(&self, filter: Filter, listener: Arc<dyn Listener>)
    -> RegistryResult<Subscription>;

    /// References of the resources matching `filter` (all when `None`),
    /// best first: highest ranking, then earliest published.
    fn references(&self, filter: Option<&Filter>) -> Vec<Reference>;

    /// Obtain the resource behind `reference` and count one use of it.
    ///
    /// Returns `None` if the resource is no longer published.
    fn get(&self, reference: &Reference) -> Option<Resource>;

    /// Give back one use of the resource behind `reference`.
    ///
    /// Returns `false` if there was no use to give back.
    fn release(&self, reference: &Reference) -> bool;
}

/// Backend of a [`Registration`] handle.
pub trait RegistrationControl: Send + Sync {
    /// Withdraw the publication.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyUnregistered`](crate::RegistryError::AlreadyUnregistered)
    /// on every call after the first.
    fn unregister(&self) -> RegistryResult<()>;

    /// Replace the caller-supplied properties.
    ///
    /// # Errors
    ///
    /// Fails once the publication has been withdrawn.
    fn set_properties(&self, properties: Properties) -> RegistryResult<()>;

    /// Current metadata, or `None` once withdrawn.
    fn reference(&self) -> Option<Reference>;
}

/// Handle to one publication.
#[derive(Clone)]
pub struct Registration {
    id: ResourceId,
    control: Arc<dyn RegistrationControl>,
}

impl Registration {
    /// Wrap a registry-specific control.
    #[must_use]
    pub fn new(id: ResourceId, control: Arc<dyn RegistrationControl>) -> Self {
        Self { id, control }
    }

    /// The id of the published resource.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Current metadata, or `None` once unregistered.
    #[must_use]
    pub fn reference(&self) -> Option<Reference> {
        self.control.reference()
    }

    /// Withdraw the publication. Matching subscriptions receive REMOVED.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyUnregistered`](crate::RegistryError::AlreadyUnregistered)
    /// if called twice.
    pub fn unregister(&self) -> RegistryResult<()> {
        self.control.unregister()
    }

    /// Replace the properties.
    ///
    /// Subscriptions that still match receive MODIFIED, those that stop
    /// matching receive REMOVED, and those that start matching receive ADDING.
    ///
    /// # Errors
    ///
    /// Fails once the publication has been withdrawn.
    pub fn set_properties(&self, properties: Properties) -> RegistryResult<()> {
        self.control.set_properties(properties)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new subscription ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend of a [`Subscription`] handle.
pub trait SubscriptionControl: Send + Sync {
    /// Stop delivering events. Returns `false` if already closed.
    fn close(&self) -> bool;

    /// Whether the subscription is closed.
    fn is_closed(&self) -> bool;
}

/// Handle to one subscription.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    control: Arc<dyn SubscriptionControl>,
}

impl Subscription {
    /// Wrap a registry-specific control.
    #[must_use]
    pub fn new(id: SubscriptionId, control: Arc<dyn SubscriptionControl>) -> Self {
        Self { id, control }
    }

    /// The subscription id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop delivering events, including any already queued.
    ///
    /// Returns `false` if the subscription was already closed.
    pub fn close(&self) -> bool {
        self.control.close()
    }

    /// Whether the subscription is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
