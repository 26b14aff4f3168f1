//! One-off lookups of published resources.
//!
//! Lookups return the best match first: highest `resource.ranking`, then the
//! earliest publication. [`Lifeline::service`] and friends count a use of each
//! resource they hand out, which [`Lifeline::release_service`] gives back;
//! [`Lifeline::with_service`] does both around a closure.

use std::any::Any;
use std::sync::Arc;

use lifeline_registry::{Filter, Reference, Registry};

use crate::error::RuntimeResult;
use crate::lifeline::Lifeline;
use crate::resource::type_key;

impl Lifeline {
    /// The best reference published under the type name of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive.
    pub fn service_ref<S: ?Sized + 'static>(&self) -> RuntimeResult<Option<Reference>> {
        Ok(self.service_refs::<S>(None)?.into_iter().next())
    }

    /// The best reference of type `S` matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or a registry error for a malformed `query`.
    pub fn service_ref_filtered<S: ?Sized + 'static>(
        &self,
        query: &str,
    ) -> RuntimeResult<Option<Reference>> {
        Ok(self.service_refs::<S>(Some(query))?.into_iter().next())
    }

    /// Every reference of type `S` matching `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or a registry error for a malformed `query`.
    pub fn service_refs<S: ?Sized + 'static>(
        &self,
        query: Option<&str>,
    ) -> RuntimeResult<Vec<Reference>> {
        let registry = self.require_registry("look up resources")?;
        let filter = Filter::for_type(type_key::<S>(), query)?;
        Ok(registry.references(Some(&filter)))
    }

    /// The best resource of type `S`, counting one use of it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive.
    pub fn service<S: Any + Send + Sync>(&self) -> RuntimeResult<Option<Arc<S>>> {
        Ok(self.services::<S>(None)?.into_iter().next())
    }

    /// The best resource of type `S` matching `query`, counting one use of it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or a registry error for a malformed `query`.
    pub fn service_filtered<S: Any + Send + Sync>(
        &self,
        query: &str,
    ) -> RuntimeResult<Option<Arc<S>>> {
        let registry = self.require_registry("get a resource")?;
        Ok(self
            .service_ref_filtered::<S>(query)?
            .and_then(|reference| acquire::<S>(registry.as_ref(), &reference)))
    }

    /// Every resource of type `S` matching `query`, best first, counting one
    /// use of each.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive, or a registry error for a malformed `query`.
    pub fn services<S: Any + Send + Sync>(
        &self,
        query: Option<&str>,
    ) -> RuntimeResult<Vec<Arc<S>>> {
        let registry = self.require_registry("get resources")?;
        Ok(self
            .service_refs::<S>(query)?
            .iter()
            .filter_map(|reference| acquire::<S>(registry.as_ref(), reference))
            .collect())
    }

    /// Give back one use counted by [`service`](Self::service) and friends.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive.
    pub fn release_service(&self, reference: &Reference) -> RuntimeResult<bool> {
        Ok(self.require_registry("release a resource")?.release(reference))
    }

    /// Call `f` with the best resource of type `S`, if any, and give the use
    /// back once `f` returns or unwinds.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Inactive`](crate::RuntimeError::Inactive) when
    /// inactive.
    pub fn with_service<S, R>(&self, f: impl FnOnce(Option<Arc<S>>) -> R) -> RuntimeResult<R>
    where
        S: Any + Send + Sync,
    {
        let registry = self.require_registry("use a resource")?;
        let Some(reference) = self.service_ref::<S>()? else {
            return Ok(f(None));
        };
        let Some(resource) = registry.get(&reference) else {
            return Ok(f(None));
        };

        let _release = Release {
            registry: registry.as_ref(),
            reference: &reference,
        };
        Ok(f(resource.downcast::<S>().ok()))
    }
}

/// Get and downcast, giving the use back if the type does not match.
fn acquire<S: Any + Send + Sync>(registry: &dyn Registry, reference: &Reference) -> Option<Arc<S>> {
    let resource = registry.get(reference)?;
    match resource.downcast::<S>() {
        Ok(typed) => Some(typed),
        Err(_) => {
            registry.release(reference);
            None
        },
    }
}

struct Release<'a> {
    registry: &'a dyn Registry,
    reference: &'a Reference,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.registry.release(self.reference);
    }
}

#[cfg(test)]
mod tests {
    use lifeline_registry::{InMemoryRegistry, properties};
    use lifeline_test::fixtures::Greeter;

    use super::*;
    use crate::resource::ProvideOptions;
    use crate::signal::ActivationSignal;

    fn active(registry: &InMemoryRegistry) -> Lifeline {
        let lifeline = Lifeline::new();
        lifeline
            .on_activate(ActivationSignal::new("c", Arc::new(registry.clone())))
            .unwrap();
        lifeline
    }

    fn publish(registry: &InMemoryRegistry, greeting: &str, rank: i64) -> Reference {
        registry
            .publish(
                Arc::new(Greeter::new(greeting)),
                vec![type_key::<Greeter>()],
                properties([("resource.ranking", rank)]),
            )
            .unwrap()
            .reference()
            .unwrap()
    }

    #[test]
    fn test_lookups_prefer_ranking_then_age() {
        let registry = InMemoryRegistry::new();
        let lifeline = active(&registry);
        publish(&registry, "old", 0);
        publish(&registry, "ranked", 10);
        publish(&registry, "new", 0);

        let best = lifeline.service::<Greeter>().unwrap().unwrap();
        assert_eq!(best.greeting(), "ranked");
        let all: Vec<String> = lifeline
            .services::<Greeter>(None)
            .unwrap()
            .iter()
            .map(|g| g.greeting().to_string())
            .collect();
        assert_eq!(all, vec!["ranked", "old", "new"]);
        assert_eq!(lifeline.service_refs::<Greeter>(None).unwrap().len(), 3);
    }

    #[test]
    fn test_filtered_lookup() {
        let registry = InMemoryRegistry::new();
        let lifeline = active(&registry);
        lifeline
            .provides_with(Greeter::new("hej"), ProvideOptions::new().with_property("lang", "sv"))
            .unwrap();
        lifeline.provides(Greeter::new("hi")).unwrap();

        let swedish = lifeline.service_filtered::<Greeter>("(lang=sv)").unwrap().unwrap();
        assert_eq!(swedish.greeting(), "hej");
        assert!(lifeline.service_ref_filtered::<Greeter>("(lang=fi)").unwrap().is_none());
        assert!(lifeline.service::<u64>().unwrap().is_none());
    }

    #[test]
    fn test_service_counts_use_and_release_gives_it_back() {
        let registry = InMemoryRegistry::new();
        let lifeline = active(&registry);
        let reference = publish(&registry, "x", 0);

        lifeline.service::<Greeter>().unwrap().unwrap();
        assert_eq!(registry.use_count(reference.id()), Some(1));
        assert!(lifeline.release_service(&reference).unwrap());
        assert_eq!(registry.use_count(reference.id()), Some(0));
    }

    #[test]
    fn test_with_service_releases_after_use() {
        let registry = InMemoryRegistry::new();
        let lifeline = active(&registry);
        let reference = publish(&registry, "borrowed", 0);

        let greeting = lifeline
            .with_service(|greeter: Option<Arc<Greeter>>| {
                assert_eq!(registry.use_count(reference.id()), Some(1));
                greeter.map(|g| g.greeting().to_string())
            })
            .unwrap();
        assert_eq!(greeting.as_deref(), Some("borrowed"));
        assert_eq!(registry.use_count(reference.id()), Some(0));

        let missing = lifeline.with_service(|s: Option<Arc<u8>>| s.is_none()).unwrap();
        assert!(missing);
    }

    #[test]
    fn test_lookups_require_activation() {
        let lifeline = Lifeline::new();
        assert!(matches!(
            lifeline.service::<Greeter>(),
            Err(crate::RuntimeError::Inactive { operation: "get resources" })
        ));
        assert!(lifeline.with_service(|_: Option<Arc<Greeter>>| ()).is_err());
    }
}
