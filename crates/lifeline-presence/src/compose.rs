//! Activation that requires several resources at once.
//!
//! `require_all([f1, f2, .., fn], block)` nests one gate per filter: the gate
//! for `f1` arms on a first matching resource and, inside its scope, opens the
//! gate for `f2`, and so on. The innermost gate runs `block` with one event per
//! filter. Removing the resource bound at any level stops that level's scope,
//! which closes every gate nested below it.

use std::sync::Arc;

use lifeline_capsule::{CapsuleContext, CapsuleError, CapsuleResult};
use lifeline_registry::{Filter, Registry};

use crate::gate::{PresenceBlock, PresenceGate, when_present};
use crate::watcher::WatcherEvent;

/// Block run once every filter has a bound resource. Events are in filter order.
pub type AllPresentBlock = Arc<dyn Fn(&[WatcherEvent]) -> CapsuleResult<()> + Send + Sync>;

/// Run `block` while one resource matching each of `filters` is present.
///
/// Returns the outermost gate, already started and registered with the scope
/// open in `context`.
///
/// # Errors
///
/// Fails if `filters` is empty, or if resources for every filter were already
/// present and activation failed.
pub fn require_all(
    context: &Arc<dyn CapsuleContext>,
    registry: &Arc<dyn Registry>,
    name: &str,
    filters: Vec<Filter>,
    block: AllPresentBlock,
) -> CapsuleResult<Arc<PresenceGate>> {
    if filters.is_empty() {
        return Err(CapsuleError::msg(format!(
            "'{name}' requires at least one filter"
        )));
    }
    let level = Level {
        context: Arc::clone(context),
        registry: Arc::clone(registry),
        name: Arc::from(name),
        filters: filters.into(),
        block,
    };
    level.open(0, Vec::new())
}

#[derive(Clone)]
struct Level {
    context: Arc<dyn CapsuleContext>,
    registry: Arc<dyn Registry>,
    name: Arc<str>,
    filters: Arc<[Filter]>,
    block: AllPresentBlock,
}

impl Level {
    fn open(&self, depth: usize, acquired: Vec<WatcherEvent>) -> CapsuleResult<Arc<PresenceGate>> {
        let filter = self
            .filters
            .get(depth)
            .cloned()
            .ok_or_else(|| CapsuleError::msg(format!("'{}' has no filter {depth}", self.name)))?;
        let next = depth.saturating_add(1);
        let is_last = next >= self.filters.len();

        let level = self.clone();
        let block: PresenceBlock = Arc::new(move |event: &WatcherEvent| {
            let mut acquired = acquired.clone();
            acquired.push(event.clone());
            if is_last {
                (level.block)(&acquired)
            } else {
                level.open(next, acquired).map(|_| ())
            }
        });

        when_present(
            &self.context,
            &self.registry,
            format!("{}[{depth}]", self.name),
            filter,
            block,
        )
    }
}

#[cfg(test)]
mod tests {
    use lifeline_capsule::{CapsuleContextExt, CapsuleScope, DynamicCapsuleContext, FnCapsule};
    use lifeline_registry::{InMemoryRegistry, Properties, Registration};
    use parking_lot::Mutex;

    use super::*;

    struct Fixture {
        registry: InMemoryRegistry,
        context: Arc<dyn CapsuleContext>,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: InMemoryRegistry::new(),
                context: Arc::new(DynamicCapsuleContext::new()),
                journal: Arc::default(),
            }
        }

        fn publish(&self, type_name: &str, value: &str) -> Registration {
            self.registry
                .publish(Arc::new(value.to_string()), vec![type_name.into()], Properties::new())
                .unwrap()
        }

        fn require(&self, types: &[&str]) -> CapsuleScope {
            let context = Arc::clone(&self.context);
            let journal = Arc::clone(&self.journal);
            let block: AllPresentBlock = Arc::new(move |events: &[WatcherEvent]| {
                let values: Vec<String> = events
                    .iter()
                    .filter_map(|e| e.downcast::<String>().map(|s| s.to_string()))
                    .collect();
                let label = values.join("+");
                journal.lock().push(format!("start {label}"));
                let stop_journal = Arc::clone(&journal);
                context.add_capsule(Arc::new(FnCapsule::on_stop("combined", move || {
                    stop_journal.lock().push(format!("stop {label}"));
                    Ok(())
                })))
            });

            let filters: Vec<Filter> = types.iter().map(|t| Filter::object_class(*t)).collect();
            let registry: Arc<dyn Registry> = Arc::new(self.registry.clone());
            self.context
                .execute_within_new_capsule_scope(|| {
                    require_all(&self.context, &registry, "combined", filters, block).map(|_| ())
                })
                .unwrap()
        }

        fn log(&self) -> Vec<String> {
            self.journal.lock().clone()
        }
    }

    #[test]
    fn test_runs_only_when_all_present() {
        let fx = Fixture::new();
        let _scope = fx.require(&["A", "B"]);

        fx.publish("A", "a1");
        assert!(fx.log().is_empty());
        fx.publish("B", "b1");
        assert_eq!(fx.log(), vec!["start a1+b1"]);
    }

    #[test]
    fn test_cascade_on_outer_removal() {
        let fx = Fixture::new();
        let _scope = fx.require(&["A", "B", "C"]);

        let a = fx.publish("A", "a1");
        fx.publish("B", "b1");
        fx.publish("C", "c1");
        assert_eq!(fx.log(), vec!["start a1+b1+c1"]);

        a.unregister().unwrap();
        assert_eq!(fx.log(), vec!["start a1+b1+c1", "stop a1+b1+c1"]);
        // Only the A gate is still watching.
        assert_eq!(fx.registry.subscription_count(), 1);
    }

    #[test]
    fn test_inner_removal_rebinds_inner_level_only() {
        let fx = Fixture::new();
        let _scope = fx.require(&["A", "B"]);

        fx.publish("A", "a1");
        let b1 = fx.publish("B", "b1");
        fx.publish("B", "b2");
        b1.unregister().unwrap();

        // The B gate disarmed; b2 was ignored while b1 was bound and is not
        // replayed, so nothing rebinds until a new B appears.
        assert_eq!(fx.log(), vec!["start a1+b1", "stop a1+b1"]);
        fx.publish("B", "b3");
        assert_eq!(fx.log(), vec!["start a1+b1", "stop a1+b1", "start a1+b3"]);
    }

    #[test]
    fn test_stopping_outer_scope_tears_everything_down() {
        let fx = Fixture::new();
        let scope = fx.require(&["A", "B"]);
        fx.publish("A", "a1");
        fx.publish("B", "b1");

        scope.stop().unwrap();
        assert_eq!(fx.log(), vec!["start a1+b1", "stop a1+b1"]);
        assert_eq!(fx.registry.subscription_count(), 0);
    }

    #[test]
    fn test_empty_filter_list_is_rejected() {
        let fx = Fixture::new();
        let registry: Arc<dyn Registry> = Arc::new(fx.registry.clone());
        let err = require_all(
            &fx.context,
            &registry,
            "nothing",
            Vec::new(),
            Arc::new(|_: &[WatcherEvent]| Ok(())),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one filter"));
    }
}
