//! Resource events and the listener trait.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::reference::{Reference, Resource};

/// What happened to a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// The resource started matching the subscription.
    Adding,
    /// The resource's properties changed and it still matches.
    Modified,
    /// The resource stopped matching, or was unregistered.
    Removed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Adding => "ADDING",
            Self::Modified => "MODIFIED",
            Self::Removed => "REMOVED",
        };
        f.write_str(s)
    }
}

/// A change to one resource, as seen by one subscription.
#[derive(Clone)]
pub struct ResourceEvent {
    kind: EventKind,
    reference: Reference,
    resource: Resource,
}

impl ResourceEvent {
    /// Create an event.
    #[must_use]
    pub fn new(kind: EventKind, reference: Reference, resource: Resource) -> Self {
        Self {
            kind,
            reference,
            resource,
        }
    }

    /// The event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Metadata of the resource, as of this event.
    #[must_use]
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// The resource object.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl fmt::Debug for ResourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEvent")
            .field("kind", &self.kind)
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

/// Receives the events of one subscription.
///
/// Calls for one subscription never overlap. Implementations may publish,
/// modify, or unregister resources from inside `on_event`; events caused by
/// that are delivered after `on_event` returns.
pub trait Listener: Send + Sync {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Failures are reported to whoever triggered the delivery.
    fn on_event(&self, event: &ResourceEvent) -> Result<(), BoxError>;

    /// Optional name for debugging.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// A listener backed by a closure.
pub struct FnListener<F>
where
    F: Fn(&ResourceEvent) -> Result<(), BoxError> + Send + Sync,
{
    name: String,
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&ResourceEvent) -> Result<(), BoxError> + Send + Sync,
{
    /// Create a new closure listener.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> Listener for FnListener<F>
where
    F: Fn(&ResourceEvent) -> Result<(), BoxError> + Send + Sync,
{
    fn on_event(&self, event: &ResourceEvent) -> Result<(), BoxError> {
        (self.handler)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnListener<F>
where
    F: Fn(&ResourceEvent) -> Result<(), BoxError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
