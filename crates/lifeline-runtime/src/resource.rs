//! Typed views of registry resources.
//!
//! Resources are published and looked up under the name of their Rust type,
//! so `provides(Clock::new())` is found by `service::<Clock>()`.

use std::any::Any;
use std::sync::Arc;

use lifeline_presence::WatcherEvent;
use lifeline_registry::{Properties, properties};
use serde_json::Value;

/// The registry type name of `S`.
#[must_use]
pub fn type_key<S: ?Sized + 'static>() -> String {
    std::any::type_name::<S>().to_string()
}

/// Extra metadata for [`Lifeline::provides_with`](crate::Lifeline::provides_with).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvideOptions {
    /// Type names published in addition to the resource's own.
    pub types: Vec<String>,
    /// Properties of the publication.
    pub properties: Properties,
}

impl ProvideOptions {
    /// No extra types and no properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also publish under the type name of `T`.
    #[must_use]
    pub fn with_type<T: ?Sized + 'static>(self) -> Self {
        self.with_type_name(type_key::<T>())
    }

    /// Also publish under `name`.
    #[must_use]
    pub fn with_type_name(mut self, name: impl Into<String>) -> Self {
        self.types.push(name.into());
        self
    }

    /// Set one property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set several properties.
    #[must_use]
    pub fn with_properties<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.properties.extend(properties(pairs));
        self
    }
}

/// A tuple of resource types that must all be present.
///
/// Implemented for tuples of one to four types; used with
/// [`Lifeline::when_services_present`](crate::Lifeline::when_services_present).
pub trait ResourceSet: 'static {
    /// The resources handed to the block, one `Arc` per type.
    type Resources;

    /// Registry type names, in tuple order.
    fn type_names() -> Vec<String>;

    /// Pick the resources out of one event per type, in tuple order.
    ///
    /// Returns `None` if an event is missing or holds another type.
    fn from_events(events: &[WatcherEvent]) -> Option<Self::Resources>;
}

macro_rules! impl_resource_set {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: Any + Send + Sync),+> ResourceSet for ($($ty,)+) {
            type Resources = ($(Arc<$ty>,)+);

            fn type_names() -> Vec<String> {
                vec![$(type_key::<$ty>()),+]
            }

            fn from_events(events: &[WatcherEvent]) -> Option<Self::Resources> {
                Some(($(events.get($idx)?.downcast::<$ty>()?,)+))
            }
        }
    };
}

impl_resource_set!(A => 0);
impl_resource_set!(A => 0, B => 1);
impl_resource_set!(A => 0, B => 1, C => 2);
impl_resource_set!(A => 0, B => 1, C => 2, D => 3);

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    #[test]
    fn test_type_key_is_the_rust_type_name() {
        assert_eq!(type_key::<u32>(), "u32");
        assert!(type_key::<Clock>().ends_with("Clock"));
    }

    #[test]
    fn test_resource_set_type_names_in_order() {
        assert_eq!(
            <(u8, String, bool) as ResourceSet>::type_names(),
            vec!["u8".to_string(), type_key::<String>(), "bool".to_string()]
        );
        assert!(<(u8,) as ResourceSet>::from_events(&[]).is_none());
    }

    #[test]
    fn test_provide_options_builder() {
        let options = ProvideOptions::new()
            .with_type::<Clock>()
            .with_type_name("Ticker")
            .with_property("zone", "utc")
            .with_properties([("resource.ranking", 5)]);
        assert_eq!(options.types, vec![type_key::<Clock>(), "Ticker".to_string()]);
        assert_eq!(options.properties.get("zone"), Some(&Value::from("utc")));
        assert_eq!(options.properties.get("resource.ranking"), Some(&Value::from(5)));
    }
}
