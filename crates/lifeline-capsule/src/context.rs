//! Capsule contexts route started capsules into the currently open scope.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::capsule::Capsule;
use crate::dynamic::DynamicVariable;
use crate::error::{CapsuleError, CapsuleResult};
use crate::scope::{CapsuleScope, MemberSet, StopPolicy};

/// A block run inside a freshly opened scope.
pub type ScopeBlock<'a> = &'a mut dyn FnMut() -> CapsuleResult<()>;

/// A scope-opening block that failed.
///
/// Carries the partially populated scope so the caller decides how to tear
/// it down.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ScopeError {
    /// Capsules registered before the block failed.
    pub scope: CapsuleScope,
    /// The failure raised by the block.
    #[source]
    pub error: CapsuleError,
}

impl ScopeError {
    /// Stop the partial scope and return the original failure.
    ///
    /// Failures while stopping the partial scope are logged, not returned.
    #[must_use]
    pub fn stop_scope(self) -> CapsuleError {
        if let Err(e) = self.scope.stop() {
            warn!(error = %e, "Failed to stop partially built capsule scope");
        }
        self.error
    }

    /// Keep the partial scope and return the original failure.
    #[must_use]
    pub fn into_parts(self) -> (CapsuleScope, CapsuleError) {
        (self.scope, self.error)
    }
}

/// Where newly started capsules are registered.
pub trait CapsuleContext: Send + Sync {
    /// Start `capsule` and register it with the scope open on this thread.
    ///
    /// # Errors
    ///
    /// Returns the capsule's start failure; the capsule is then not
    /// registered anywhere.
    fn add_capsule(&self, capsule: Arc<dyn Capsule>) -> CapsuleResult<()>;

    /// Run `block` with a fresh scope open and return that scope.
    ///
    /// Capsules added while the block runs on this thread, or on threads
    /// spawned from it with [`spawn`](crate::spawn), belong to the new scope.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] carrying the partial scope when the block fails.
    fn open_scope(&self, block: ScopeBlock<'_>) -> Result<CapsuleScope, ScopeError>;

    /// Whether a scope is open on the calling thread.
    fn is_within_scope(&self) -> bool;
}

/// Generic conveniences over [`CapsuleContext`].
pub trait CapsuleContextExt: CapsuleContext {
    /// Run a one-shot `block` inside a new scope.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] carrying the partial scope when the block fails.
    fn execute_within_new_capsule_scope<F>(&self, block: F) -> Result<CapsuleScope, ScopeError>
    where
        F: FnOnce() -> CapsuleResult<()>,
    {
        let mut block = Some(block);
        self.open_scope(&mut || block.take().map_or(Ok(()), |f| f()))
    }
}

impl<C: CapsuleContext + ?Sized> CapsuleContextExt for C {}

/// A capsule context whose open scope is tracked in a [`DynamicVariable`].
///
/// Each context has its own variable, so several contexts on one thread
/// never see each other's scopes.
pub struct DynamicCapsuleContext {
    current: DynamicVariable<Option<Arc<MemberSet>>>,
    policy: StopPolicy,
}

impl DynamicCapsuleContext {
    /// Create a context whose scopes drain all members on stop.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(StopPolicy::default())
    }

    /// Create a context whose scopes use `policy`.
    #[must_use]
    pub fn with_policy(policy: StopPolicy) -> Self {
        Self {
            current: DynamicVariable::new(None),
            policy,
        }
    }

    /// The stop policy given to new scopes.
    #[must_use]
    pub fn policy(&self) -> StopPolicy {
        self.policy
    }
}

impl Default for DynamicCapsuleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DynamicCapsuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCapsuleContext")
            .field("policy", &self.policy)
            .field("within_scope", &self.is_within_scope())
            .finish()
    }
}

impl CapsuleContext for DynamicCapsuleContext {
    fn add_capsule(&self, capsule: Arc<dyn Capsule>) -> CapsuleResult<()> {
        capsule.start()?;

        match self.current.value() {
            Some(members) => {
                if members.insert(Arc::clone(&capsule)) {
                    trace!(capsule = %capsule.name(), "Capsule added to open scope");
                } else {
                    warn!(
                        capsule = %capsule.name(),
                        "Scope was sealed before capsule registration; capsule is untracked"
                    );
                }
            },
            None => {
                debug!(capsule = %capsule.name(), "No open scope; capsule is untracked");
            },
        }
        Ok(())
    }

    fn open_scope(&self, block: ScopeBlock<'_>) -> Result<CapsuleScope, ScopeError> {
        let members = Arc::new(MemberSet::new());
        let unwind = StopOnUnwind {
            members: Some(Arc::clone(&members)),
            policy: self.policy,
        };
        let result = self.current.with_value(Some(Arc::clone(&members)), block);
        unwind.disarm();
        let scope = CapsuleScope::new(members.seal(), self.policy);

        match result {
            Ok(()) => {
                trace!(members = scope.len(), "Capsule scope opened");
                Ok(scope)
            },
            Err(error) => {
                debug!(members = scope.len(), error = %error, "Scope block failed");
                Err(ScopeError { scope, error })
            },
        }
    }

    fn is_within_scope(&self) -> bool {
        self.current.value().is_some()
    }
}

/// Stops a partially built scope if its block unwinds.
struct StopOnUnwind {
    members: Option<Arc<MemberSet>>,
    policy: StopPolicy,
}

impl StopOnUnwind {
    fn disarm(mut self) {
        self.members = None;
    }
}

impl Drop for StopOnUnwind {
    fn drop(&mut self) {
        let Some(members) = self.members.take() else {
            return;
        };
        let scope = CapsuleScope::new(members.seal(), self.policy);
        warn!(members = scope.len(), "Scope block panicked; stopping its partial scope");
        if let Err(e) = scope.stop() {
            warn!(error = %e, "Failed to stop scope of panicked block");
        }
    }
}
