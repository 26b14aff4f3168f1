//! Presence-gated activation.
//!
//! A [`PresenceGate`] runs a block once a matching resource appears, inside a
//! fresh capsule scope, and stops that scope when the same resource goes away.
//!
//! ```text
//! UNARMED  + ADDING(r)        -> run block; ARMED(r, scope) or stay UNARMED on failure
//! ARMED(r) + ADDING(r2)       -> ignored
//! ARMED(r) + REMOVED(r)       -> stop scope; UNARMED
//! ARMED(r) + REMOVED(r2)      -> ignored
//! any      + MODIFIED         -> ignored
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lifeline_capsule::{
    Capsule, CapsuleContext, CapsuleContextExt, CapsuleResult, CapsuleScope,
};
use lifeline_registry::{EventKind, Filter, Registry, ResourceId};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::watcher::{PresenceWatcher, WatchHandler, WatcherEvent};

/// Block run when a gate arms.
pub type PresenceBlock = Arc<dyn Fn(&WatcherEvent) -> CapsuleResult<()> + Send + Sync>;

/// A capsule that activates a block while one matching resource is present.
///
/// Starting the gate starts its watcher. Stopping it closes the watcher and
/// then stops the armed scope, if any.
pub struct PresenceGate {
    watcher: PresenceWatcher,
    state: Arc<GateState>,
}

struct GateState {
    name: String,
    armed: Mutex<Option<Armed>>,
    closed: AtomicBool,
}

struct Armed {
    bound: ResourceId,
    scope: CapsuleScope,
}

impl PresenceGate {
    /// Create a stopped gate.
    ///
    /// Capsules added by `block` land in the scope the gate opens for it;
    /// `context` must be the context `block` adds them through.
    pub fn new(
        name: impl Into<String>,
        context: Arc<dyn CapsuleContext>,
        registry: Arc<dyn Registry>,
        filter: Filter,
        block: PresenceBlock,
    ) -> Self {
        let name = name.into();
        let state = Arc::new(GateState {
            name: name.clone(),
            armed: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let handler_state = Arc::clone(&state);
        let handler: WatchHandler = Arc::new(move |event: &WatcherEvent| {
            handler_state.on_event(context.as_ref(), &block, event)
        });

        Self {
            watcher: PresenceWatcher::new(name, registry, filter, handler),
            state,
        }
    }

    /// Whether a scope is currently active.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state.armed.lock().is_some()
    }

    /// The resource the active scope is bound to.
    #[must_use]
    pub fn bound_resource(&self) -> Option<ResourceId> {
        self.state.armed.lock().as_ref().map(|armed| armed.bound)
    }

    /// The filter of the underlying watcher.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        self.watcher.filter()
    }
}

impl fmt::Debug for PresenceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceGate")
            .field("name", &self.state.name)
            .field("bound", &self.bound_resource())
            .field("watcher", &self.watcher)
            .finish()
    }
}

impl Capsule for PresenceGate {
    fn start(&self) -> CapsuleResult<()> {
        self.state.closed.store(false, Ordering::Release);
        if let Err(e) = self.watcher.start() {
            // A resource may have armed the gate before a later one failed.
            if let Err(stop_error) = self.state.disarm() {
                warn!(gate = %self.state.name, error = %stop_error, "Failed to stop scope of failed gate");
            }
            return Err(e);
        }
        Ok(())
    }

    fn stop(&self) -> CapsuleResult<()> {
        self.state.closed.store(true, Ordering::Release);
        self.watcher.stop()?;
        self.state.disarm()
    }

    fn name(&self) -> &str {
        &self.state.name
    }
}

impl GateState {
    fn on_event(
        &self,
        context: &dyn CapsuleContext,
        block: &PresenceBlock,
        event: &WatcherEvent,
    ) -> CapsuleResult<()> {
        let id = event.reference().id();
        match event.kind() {
            EventKind::Adding => self.on_adding(context, block, event, id),
            EventKind::Removed => self.on_removed(id),
            EventKind::Modified => Ok(()),
        }
    }

    fn on_adding(
        &self,
        context: &dyn CapsuleContext,
        block: &PresenceBlock,
        event: &WatcherEvent,
        id: ResourceId,
    ) -> CapsuleResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(armed) = self.armed.lock().as_ref() {
            trace!(gate = %self.name, bound = %armed.bound, ignored = %id, "Gate already armed");
            return Ok(());
        }

        let scope = context
            .execute_within_new_capsule_scope(|| block(event))
            .map_err(|failure| {
                failure
                    .stop_scope()
                    .context(format!("activating '{}' for resource {id}", self.name))
            })?;

        let mut armed = self.armed.lock();
        if self.closed.load(Ordering::Acquire) || armed.is_some() {
            drop(armed);
            debug!(gate = %self.name, resource_id = %id, "Gate closed during activation");
            return scope.stop();
        }
        debug!(
            gate = %self.name,
            resource_id = %id,
            members = scope.len(),
            "Gate armed"
        );
        *armed = Some(Armed { bound: id, scope });
        Ok(())
    }

    fn on_removed(&self, id: ResourceId) -> CapsuleResult<()> {
        let disarmed = {
            let mut armed = self.armed.lock();
            match armed.as_ref() {
                Some(current) if current.bound == id => armed.take(),
                _ => None,
            }
        };
        match disarmed {
            Some(armed) => {
                debug!(gate = %self.name, resource_id = %id, "Bound resource removed; disarming gate");
                armed
                    .scope
                    .stop()
                    .map_err(|e| e.context(format!("deactivating '{}'", self.name)))
            },
            None => Ok(()),
        }
    }

    fn disarm(&self) -> CapsuleResult<()> {
        let disarmed = self.armed.lock().take();
        match disarmed {
            Some(armed) => {
                debug!(gate = %self.name, resource_id = %armed.bound, "Gate stopped while armed");
                armed.scope.stop()
            },
            None => Ok(()),
        }
    }
}

/// Create a gate, start it, and register it with the scope open in `context`.
///
/// # Errors
///
/// Returns the failure of the initial activation, if a matching resource was
/// already present and the block failed for it.
pub fn when_present(
    context: &Arc<dyn CapsuleContext>,
    registry: &Arc<dyn Registry>,
    name: impl Into<String>,
    filter: Filter,
    block: PresenceBlock,
) -> CapsuleResult<Arc<PresenceGate>> {
    let gate = Arc::new(PresenceGate::new(
        name,
        Arc::clone(context),
        Arc::clone(registry),
        filter,
        block,
    ));
    context.add_capsule(Arc::clone(&gate) as Arc<dyn Capsule>)?;
    Ok(gate)
}
