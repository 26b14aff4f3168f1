//! The root activation controller.

use std::fmt;
use std::sync::{Arc, Weak};

use lifeline_capsule::{
    Capsule, CapsuleContext, CapsuleContextExt, CapsuleError, CapsuleResult, CapsuleScope,
    DynamicCapsuleContext, FnCapsule,
};
use lifeline_config::Config;
use lifeline_registry::Registry;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::config_bridge::to_runtime_config;
use crate::error::{RuntimeError, RuntimeResult};
use crate::signal::ActivationSignal;

/// A root handler. Runs once per activation inside its own top-level scope.
pub type RootHandler = Arc<dyn Fn(&Lifeline) -> CapsuleResult<()> + Send + Sync>;

/// The outermost capsule context, bound to a host's activate/deactivate
/// callbacks.
///
/// Handlers registered with [`when_active`](Self::when_active) run on
/// [`on_activate`](Self::on_activate), each inside a fresh top-level scope.
/// [`on_deactivate`](Self::on_deactivate) stops those scopes, which stops
/// everything started beneath them.
///
/// `Lifeline` is a cheap handle; clones share state. Closures the runtime
/// stores on behalf of callers hold a [`WeakLifeline`], so dropping the last
/// handle frees the root even while it is active.
#[derive(Clone)]
pub struct Lifeline {
    inner: Arc<Inner>,
}

/// A non-owning [`Lifeline`] handle.
#[derive(Clone)]
pub struct WeakLifeline {
    inner: Weak<Inner>,
}

struct Inner {
    config: RuntimeConfig,
    context: Arc<DynamicCapsuleContext>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    handlers: Vec<HandlerSlot>,
    signal: Option<ActivationSignal>,
    scopes: Vec<CapsuleScope>,
    /// Bumped on every activation and deactivation.
    generation: u64,
}

struct HandlerSlot {
    name: String,
    handler: RootHandler,
    started: bool,
}

impl Lifeline {
    /// Create an inactive root with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create an inactive root.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        let context = Arc::new(DynamicCapsuleContext::with_policy(config.stop_policy));
        Self {
            inner: Arc::new(Inner {
                config,
                context,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Create an inactive root from a loaded configuration file.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_config(to_runtime_config(config))
    }

    /// A non-owning handle to this root.
    #[must_use]
    pub fn downgrade(&self) -> WeakLifeline {
        WeakLifeline {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The settings this root was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The context capsules are routed through.
    #[must_use]
    pub fn context(&self) -> Arc<dyn CapsuleContext> {
        Arc::clone(&self.inner.context) as Arc<dyn CapsuleContext>
    }

    /// Whether the root holds an activation signal.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().signal.is_some()
    }

    /// The current activation signal.
    #[must_use]
    pub fn signal(&self) -> Option<ActivationSignal> {
        self.inner.state.lock().signal.clone()
    }

    /// Number of top-level scopes currently held.
    #[must_use]
    pub fn top_level_scope_count(&self) -> usize {
        self.inner.state.lock().scopes.len()
    }

    /// Number of registered root handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.state.lock().handlers.len()
    }

    /// The registry of the current activation.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`] naming `operation` when inactive.
    pub(crate) fn require_registry(&self, operation: &'static str) -> RuntimeResult<Arc<dyn Registry>> {
        self.inner
            .state
            .lock()
            .signal
            .as_ref()
            .map(|signal| Arc::clone(signal.registry()))
            .ok_or(RuntimeError::Inactive { operation })
    }

    /// Register a root handler.
    ///
    /// If the root is already active the handler runs immediately, in its own
    /// top-level scope.
    ///
    /// # Errors
    ///
    /// Returns the handler's failure when it ran immediately. Its partial
    /// scope is kept and stopped on deactivation.
    pub fn when_active<F>(&self, handler: F) -> RuntimeResult<()>
    where
        F: Fn(&Lifeline) -> CapsuleResult<()> + Send + Sync + 'static,
    {
        let pending = {
            let mut state = self.inner.state.lock();
            let name = format!("root handler #{}", state.handlers.len().saturating_add(1));
            if state.handlers.is_empty() {
                debug!(root = %self.inner.config.name, "Registering root handler");
            } else {
                debug!(root = %self.inner.config.name, handler = %name, "Registering additional root handler");
            }
            state.handlers.push(HandlerSlot {
                name,
                handler: Arc::new(handler),
                started: false,
            });
            if state.signal.is_some() {
                Self::claim_pending(&mut state)
            } else {
                Vec::new()
            }
        };
        self.run_handlers(pending)
    }

    /// Host entry point: become active with `signal`.
    ///
    /// Every not yet started handler runs in its own top-level scope. A failing
    /// handler keeps its partial scope for teardown and does not prevent the
    /// others from running.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AlreadyActive`] without touching any state if a
    /// signal is already held, and otherwise the handler failures folded with
    /// [`CapsuleError::aggregate`].
    pub fn on_activate(&self, signal: ActivationSignal) -> RuntimeResult<()> {
        let pending = {
            let mut state = self.inner.state.lock();
            if let Some(current) = &state.signal {
                error!(
                    root = %self.inner.config.name,
                    active = %current.name(),
                    requested = %signal.name(),
                    "Root is already active; ignoring activation request"
                );
                return Err(RuntimeError::AlreadyActive {
                    name: current.name().to_string(),
                });
            }

            info!(root = %self.inner.config.name, signal = %signal.name(), "Root activated");
            state.signal = Some(signal);
            state.generation = state.generation.wrapping_add(1);
            if state.handlers.is_empty() && self.inner.config.warn_without_handlers {
                warn!(root = %self.inner.config.name, "Activating a root without any registered handler");
            }
            Self::claim_pending(&mut state)
        };
        self.run_handlers(pending)
    }

    /// Host entry point: become inactive.
    ///
    /// Top-level scopes are stopped in the order they were created; each is
    /// removed as it stops. Every scope is attempted even when earlier ones
    /// fail. Afterwards all handlers are marked not started and the signal is
    /// released. Handlers that start while this runs have their scopes
    /// stopped too, whether they finish before or after it returns. Calling
    /// this while inactive is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the stop failures folded with [`CapsuleError::aggregate`].
    pub fn on_deactivate(&self) -> RuntimeResult<()> {
        {
            let mut state = self.inner.state.lock();
            if state.signal.is_none() && state.scopes.is_empty() {
                debug!(root = %self.inner.config.name, "Root already inactive");
                return Ok(());
            }
            state.generation = state.generation.wrapping_add(1);
        }

        let mut failures = Vec::new();
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                if state.scopes.is_empty() {
                    None
                } else {
                    Some(state.scopes.remove(0))
                }
            };
            let Some(scope) = next else { break };
            debug!(root = %self.inner.config.name, members = scope.len(), "Stopping top-level scope");
            if let Err(e) = scope.stop() {
                debug!(root = %self.inner.config.name, error = %e, "Top-level scope failed to stop");
                failures.push(e);
            }
        }

        // A handler claimed while the loop ran may have pushed its scope
        // after the last pop. Bumping the generation again makes any handler
        // still running stop its own scope instead of keeping it.
        let stragglers = {
            let mut state = self.inner.state.lock();
            for slot in &mut state.handlers {
                slot.started = false;
            }
            state.signal = None;
            state.generation = state.generation.wrapping_add(1);
            std::mem::take(&mut state.scopes)
        };
        for scope in stragglers {
            debug!(root = %self.inner.config.name, members = scope.len(), "Stopping scope of handler that finished during deactivation");
            if let Err(e) = scope.stop() {
                failures.push(e);
            }
        }
        info!(root = %self.inner.config.name, failures = failures.len(), "Root deactivated");

        match CapsuleError::aggregate(failures) {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Start `capsule` and register it with the scope open on this thread.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`] when inactive, or the capsule's
    /// start failure.
    pub fn add_capsule(&self, capsule: Arc<dyn Capsule>) -> RuntimeResult<()> {
        self.require_registry("add a capsule")?;
        self.inner.context.add_capsule(capsule)?;
        Ok(())
    }

    /// Run `block` inside a new scope and return that scope.
    ///
    /// On failure the partial scope is stopped and the block's error
    /// returned; use [`context`](Self::context) to keep the partial scope.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`] when inactive, or the block's
    /// failure.
    pub fn execute_within_new_capsule_scope<F>(&self, block: F) -> RuntimeResult<CapsuleScope>
    where
        F: FnOnce() -> CapsuleResult<()>,
    {
        self.require_registry("open a capsule scope")?;
        self.inner
            .context
            .execute_within_new_capsule_scope(block)
            .map_err(|failure| RuntimeError::Capsule(failure.stop_scope()))
    }

    /// Run `action` when the currently open scope stops.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`] when inactive.
    pub fn on_stop<F>(&self, action: F) -> RuntimeResult<()>
    where
        F: Fn() -> CapsuleResult<()> + Send + Sync + 'static,
    {
        self.add_capsule(Arc::new(FnCapsule::on_stop("on_stop", action)))
    }

    /// Mark every unstarted handler started and hand them out.
    fn claim_pending(state: &mut State) -> Vec<PendingHandler> {
        let generation = state.generation;
        state
            .handlers
            .iter_mut()
            .filter(|slot| !slot.started)
            .map(|slot| {
                slot.started = true;
                PendingHandler {
                    name: slot.name.clone(),
                    handler: Arc::clone(&slot.handler),
                    generation,
                }
            })
            .collect()
    }

    fn run_handlers(&self, pending: Vec<PendingHandler>) -> RuntimeResult<()> {
        let failures: Vec<CapsuleError> = pending
            .into_iter()
            .filter_map(|handler| self.run_handler(handler).err())
            .collect();
        match CapsuleError::aggregate(failures) {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn run_handler(&self, pending: PendingHandler) -> CapsuleResult<()> {
        let root = &self.inner.config.name;
        debug!(root = %root, handler = %pending.name, "Starting root handler");

        let (scope, result) = match self
            .inner
            .context
            .execute_within_new_capsule_scope(|| (pending.handler)(self))
        {
            Ok(scope) => (scope, Ok(())),
            Err(failure) => {
                let (scope, e) = failure.into_parts();
                debug!(root = %root, handler = %pending.name, error = %e, "Root handler failed");
                (scope, Err(e.context(format!("running {}", pending.name))))
            },
        };

        let stale = {
            let mut state = self.inner.state.lock();
            if state.generation == pending.generation {
                state.scopes.push(scope);
                None
            } else {
                Some(scope)
            }
        };
        if let Some(scope) = stale {
            debug!(root = %root, handler = %pending.name, "Root deactivated while handler ran; stopping its scope");
            scope.stop()?;
        }
        result
    }
}

impl Default for Lifeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Lifeline")
            .field("name", &self.inner.config.name)
            .field("signal", &state.signal)
            .field("handlers", &state.handlers.len())
            .field("scopes", &state.scopes.len())
            .finish_non_exhaustive()
    }
}

impl WeakLifeline {
    /// The root, if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Lifeline> {
        self.inner.upgrade().map(|inner| Lifeline { inner })
    }

    /// Upgrade or fail as if the root were inactive.
    pub(crate) fn require(&self, operation: &'static str) -> CapsuleResult<Lifeline> {
        self.upgrade()
            .ok_or_else(|| RuntimeError::Inactive { operation }.into())
    }
}

impl fmt::Debug for WeakLifeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLifeline")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

struct PendingHandler {
    name: String,
    handler: RootHandler,
    generation: u64,
}
