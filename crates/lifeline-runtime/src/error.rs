//! Runtime error types.

use lifeline_capsule::CapsuleError;
use lifeline_registry::RegistryError;
use thiserror::Error;

/// Errors raised by a [`Lifeline`](crate::Lifeline).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An operation that needs an activation signal was called while the
    /// root is inactive.
    #[error("cannot {operation}: lifeline is not active")]
    Inactive {
        /// The operation that was refused.
        operation: &'static str,
    },

    /// `on_activate` was called while already active.
    #[error("lifeline '{name}' is already active")]
    AlreadyActive {
        /// Name of the signal the root is active with.
        name: String,
    },

    /// A capsule, scope or handler failed.
    #[error(transparent)]
    Capsule(#[from] CapsuleError),

    /// The registry refused a request.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl From<RuntimeError> for CapsuleError {
    fn from(error: RuntimeError) -> Self {
        match error {
            RuntimeError::Capsule(inner) => inner,
            other => CapsuleError::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capsule_errors_unwrap_on_conversion() {
        let err = RuntimeError::from(CapsuleError::msg("boom"));
        let back = CapsuleError::from(err);
        assert!(matches!(back, CapsuleError::Message(ref m) if m == "boom"));
    }

    #[test]
    fn test_other_errors_are_wrapped() {
        let back = CapsuleError::from(RuntimeError::Inactive { operation: "provide" });
        assert_eq!(back.to_string(), "cannot provide: lifeline is not active");
        assert!(matches!(back, CapsuleError::Other(_)));
    }
}
