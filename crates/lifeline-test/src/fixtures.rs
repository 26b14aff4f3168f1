//! Resource types for registry tests.

/// A resource carrying a greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeter {
    greeting: String,
}

impl Greeter {
    /// Create a greeter.
    #[must_use]
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
        }
    }

    /// The greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }
}

/// A named storage resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    name: String,
}

impl Store {
    /// Create a store.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
