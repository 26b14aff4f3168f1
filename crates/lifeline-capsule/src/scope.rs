//! Capsule scopes: immutable stop-groups of started capsules.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capsule::Capsule;
use crate::error::{CapsuleError, CapsuleResult};

/// How a scope reacts when one of its members fails to stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Stop every member, then raise the collected failures.
    #[default]
    DrainAll,
    /// Stop members until the first failure and raise it.
    FailFast,
}

/// The member set a capsule context routes new capsules into.
///
/// Open while the block that created it runs; sealed once the block returns.
pub(crate) struct MemberSet {
    state: Mutex<MemberSetState>,
}

#[derive(Default)]
struct MemberSetState {
    capsules: Vec<Arc<dyn Capsule>>,
    sealed: bool,
}

impl MemberSet {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MemberSetState::default()),
        }
    }

    /// Append a started capsule. Returns `false` if the set is sealed.
    pub(crate) fn insert(&self, capsule: Arc<dyn Capsule>) -> bool {
        let mut state = self.state.lock();
        if state.sealed {
            return false;
        }
        state.capsules.push(capsule);
        true
    }

    /// Freeze the set and hand back its members in insertion order.
    pub(crate) fn seal(&self) -> Vec<Arc<dyn Capsule>> {
        let mut state = self.state.lock();
        state.sealed = true;
        std::mem::take(&mut state.capsules)
    }
}

/// An ordered group of started capsules that stop together.
///
/// Membership is fixed at construction. [`stop`](Self::stop) stops members in
/// insertion order and takes effect at most once; later calls return `Ok(())`
/// without touching the members.
pub struct CapsuleScope {
    capsules: Vec<Arc<dyn Capsule>>,
    policy: StopPolicy,
    stopped: AtomicBool,
}

impl CapsuleScope {
    /// Create a scope over already started capsules.
    #[must_use]
    pub fn new(capsules: Vec<Arc<dyn Capsule>>, policy: StopPolicy) -> Self {
        Self {
            capsules,
            policy,
            stopped: AtomicBool::new(false),
        }
    }

    /// A scope with no members.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), StopPolicy::default())
    }

    /// Number of member capsules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capsules.len()
    }

    /// Whether the scope has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capsules.is_empty()
    }

    /// Names of the members, in stop order.
    #[must_use]
    pub fn capsule_names(&self) -> Vec<String> {
        self.capsules.iter().map(|c| c.name().to_string()).collect()
    }

    /// Whether [`stop`](Self::stop) has already run.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// The stop policy of this scope.
    #[must_use]
    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    /// Stop every member in insertion order.
    ///
    /// # Errors
    ///
    /// Under [`StopPolicy::DrainAll`], every member is stopped and a single
    /// failure is returned as is, while several are folded into
    /// [`CapsuleError::StopFailed`]. Under [`StopPolicy::FailFast`], the first
    /// failure is returned and the remaining members are left running.
    pub fn stop(&self) -> CapsuleResult<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!(members = self.capsules.len(), "Capsule scope already stopped");
            return Ok(());
        }

        debug!(
            members = self.capsules.len(),
            policy = ?self.policy,
            "Stopping capsule scope"
        );

        let mut failures = Vec::new();
        for capsule in &self.capsules {
            if let Err(e) = capsule.stop() {
                warn!(capsule = %capsule.name(), error = %e, "Capsule failed to stop");
                let e = e.context(format!("stopping capsule '{}'", capsule.name()));
                if self.policy == StopPolicy::FailFast {
                    return Err(e);
                }
                failures.push(e);
            }
        }

        CapsuleError::aggregate(failures).map_or(Ok(()), Err)
    }
}

impl fmt::Debug for CapsuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapsuleScope")
            .field("members", &self.capsule_names())
            .field("policy", &self.policy)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
