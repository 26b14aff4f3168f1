//! Registry error types.

use thiserror::Error;

use crate::reference::ResourceId;

/// Boxed error type returned by listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur with registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A filter string could not be parsed.
    #[error("Invalid filter '{filter}': {reason}")]
    InvalidFilter {
        /// The offending filter text.
        filter: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The resource was unregistered before.
    #[error("Resource {0} is already unregistered")]
    AlreadyUnregistered(ResourceId),

    /// A listener failed while handling an event.
    #[error("Listener '{listener}' failed: {source}")]
    Listener {
        /// Name of the failing listener.
        listener: String,
        /// The listener's error.
        #[source]
        source: BoxError,
    },

    /// The registry behind a handle has been dropped.
    #[error("Registry is no longer available")]
    Closed,
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
