//! Resource references and their properties.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property map attached to a published resource.
pub type Properties = BTreeMap<String, Value>;

/// A published resource object.
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Property holding the type names a resource is published under.
pub const OBJECT_CLASS: &str = "objectClass";

/// Property holding the registry-assigned resource id.
pub const RESOURCE_ID: &str = "resource.id";

/// Property holding the resource ranking. Higher ranks are preferred.
pub const RESOURCE_RANKING: &str = "resource.ranking";

/// Build a property map from key/value pairs.
pub fn properties<I, K, V>(pairs: I) -> Properties
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Registry-assigned identity of a published resource.
///
/// Ids grow monotonically, so a lower id means an earlier publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata describing one published resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    id: ResourceId,
    type_names: Vec<String>,
    properties: Properties,
}

impl Reference {
    /// Create a reference.
    ///
    /// The `objectClass` and `resource.id` properties are always set from
    /// `type_names` and `id`, overriding any caller-supplied values.
    #[must_use]
    pub fn new(id: ResourceId, type_names: Vec<String>, mut properties: Properties) -> Self {
        properties.insert(
            OBJECT_CLASS.to_string(),
            Value::Array(type_names.iter().cloned().map(Value::String).collect()),
        );
        properties.insert(RESOURCE_ID.to_string(), Value::from(id.get()));
        Self {
            id,
            type_names,
            properties,
        }
    }

    /// The resource id.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The type names the resource is published under.
    #[must_use]
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    /// Whether the resource is published under `type_name`.
    #[must_use]
    pub fn has_type(&self, type_name: &str) -> bool {
        self.type_names.iter().any(|t| t == type_name)
    }

    /// All properties, including `objectClass` and `resource.id`.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Look up a property. Keys match case-insensitively.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        lookup(&self.properties, key)
    }

    /// The ranking, defaulting to 0.
    #[must_use]
    pub fn ranking(&self) -> i64 {
        self.property(RESOURCE_RANKING)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Preference order: highest ranking first, then earliest published.
    #[must_use]
    pub fn preference(&self, other: &Self) -> Ordering {
        other
            .ranking()
            .cmp(&self.ranking())
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Replace the caller-supplied properties, keeping identity properties.
    #[must_use]
    pub(crate) fn with_properties(&self, properties: Properties) -> Self {
        Self::new(self.id, self.type_names.clone(), properties)
    }
}

/// Case-insensitive property lookup, preferring an exact key match.
pub(crate) fn lookup<'a>(properties: &'a Properties, key: &str) -> Option<&'a Value> {
    properties.get(key).or_else(|| {
        properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}
