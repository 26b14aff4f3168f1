//! The capsule trait and closure-backed capsules.

use std::fmt;

use crate::error::CapsuleResult;

/// A startable and stoppable unit of lifecycle.
///
/// `start` runs synchronously when the capsule is added to a
/// [`CapsuleContext`](crate::CapsuleContext). `stop` runs synchronously when
/// the [`CapsuleScope`](crate::CapsuleScope) that owns the capsule stops.
/// A capsule has no identity beyond its behavior, so the same capsule may be
/// registered more than once.
pub trait Capsule: Send + Sync {
    /// Start the capsule.
    ///
    /// # Errors
    ///
    /// A failed start propagates to the caller of `add_capsule`, and the
    /// capsule is not registered in the open scope.
    fn start(&self) -> CapsuleResult<()>;

    /// Stop the capsule.
    ///
    /// # Errors
    ///
    /// Stop failures are collected by the owning scope.
    fn stop(&self) -> CapsuleResult<()>;

    /// Optional name for debugging.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// A lifecycle action run by a [`FnCapsule`].
pub type CapsuleAction = Box<dyn Fn() -> CapsuleResult<()> + Send + Sync>;

/// A capsule built from closures.
///
/// Either action may be absent, in which case that half of the lifecycle is a
/// no-op. [`FnCapsule::on_stop`] builds the stop-only capsules used for ad-hoc
/// cleanup.
pub struct FnCapsule {
    name: String,
    on_start: Option<CapsuleAction>,
    on_stop: Option<CapsuleAction>,
}

impl FnCapsule {
    /// Create a capsule with both a start and a stop action.
    pub fn new<S, T>(name: impl Into<String>, on_start: S, on_stop: T) -> Self
    where
        S: Fn() -> CapsuleResult<()> + Send + Sync + 'static,
        T: Fn() -> CapsuleResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            on_start: Some(Box::new(on_start)),
            on_stop: Some(Box::new(on_stop)),
        }
    }

    /// Create a capsule whose start does nothing and whose stop runs `action`.
    pub fn on_stop<T>(name: impl Into<String>, action: T) -> Self
    where
        T: Fn() -> CapsuleResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            on_start: None,
            on_stop: Some(Box::new(action)),
        }
    }

    /// Create a capsule whose stop does nothing.
    pub fn on_start<S>(name: impl Into<String>, action: S) -> Self
    where
        S: Fn() -> CapsuleResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            on_start: Some(Box::new(action)),
            on_stop: None,
        }
    }
}

impl fmt::Debug for FnCapsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapsule")
            .field("name", &self.name)
            .field("has_start", &self.on_start.is_some())
            .field("has_stop", &self.on_stop.is_some())
            .finish()
    }
}

impl Capsule for FnCapsule {
    fn start(&self) -> CapsuleResult<()> {
        self.on_start.as_ref().map_or(Ok(()), |action| action())
    }

    fn stop(&self) -> CapsuleResult<()> {
        self.on_stop.as_ref().map_or(Ok(()), |action| action())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::CapsuleError;

    #[test]
    fn test_fn_capsule_runs_actions() {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&starts);
        let t = Arc::clone(&stops);

        let capsule = FnCapsule::new(
            "counter",
            move || {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move || {
                t.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        capsule.start().unwrap();
        capsule.stop().unwrap();
        capsule.stop().unwrap();

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 2);
        assert_eq!(capsule.name(), "counter");
    }

    #[test]
    fn test_stop_only_capsule_has_no_start() {
        let capsule = FnCapsule::on_stop("cleanup", || Err(CapsuleError::msg("cleanup failed")));
        assert!(capsule.start().is_ok());
        assert!(capsule.stop().is_err());
    }
}
