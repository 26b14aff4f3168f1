//! Capsule error types.

use thiserror::Error;

/// Boxed error type accepted from user code and foreign crates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while starting or stopping capsules.
#[derive(Debug, Error)]
pub enum CapsuleError {
    /// A plain failure message raised by capsule or handler code.
    #[error("{0}")]
    Message(String),

    /// An error annotated with the operation that was running.
    #[error("{context}: {source}")]
    Context {
        /// What was being done when the error occurred.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<CapsuleError>,
    },

    /// Several members of a scope failed to stop.
    #[error("{first} ({} more stop failure(s) suppressed)", .suppressed.len())]
    StopFailed {
        /// The first stop failure, in stop order.
        first: Box<CapsuleError>,
        /// The failures that followed it.
        suppressed: Vec<CapsuleError>,
    },

    /// An error raised by a foreign crate.
    #[error(transparent)]
    Other(#[from] BoxError),
}

impl CapsuleError {
    /// Create an error from a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error.
    #[must_use]
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }

    /// Annotate this error with the operation that was running.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Fold a list of failures into a single error.
    ///
    /// Returns `None` for an empty list, the error itself for a single
    /// failure, and [`CapsuleError::StopFailed`] otherwise.
    #[must_use]
    pub fn aggregate(errors: Vec<CapsuleError>) -> Option<Self> {
        let mut errors = errors.into_iter();
        let first = errors.next()?;
        let suppressed: Vec<CapsuleError> = errors.collect();
        if suppressed.is_empty() {
            Some(first)
        } else {
            Some(Self::StopFailed {
                first: Box::new(first),
                suppressed,
            })
        }
    }

    /// Number of individual failures this error stands for.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        match self {
            Self::StopFailed { suppressed, .. } => suppressed.len().saturating_add(1),
            _ => 1,
        }
    }
}

/// A specialized Result type for capsule operations.
pub type CapsuleResult<T> = Result<T, CapsuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let err = CapsuleError::msg("boom").context("starting watcher");
        assert_eq!(err.to_string(), "starting watcher: boom");
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(CapsuleError::aggregate(Vec::new()).is_none());
    }

    #[test]
    fn test_aggregate_single_is_unwrapped() {
        let err = CapsuleError::aggregate(vec![CapsuleError::msg("only")]).unwrap();
        assert!(matches!(err, CapsuleError::Message(ref m) if m == "only"));
        assert_eq!(err.failure_count(), 1);
    }

    #[test]
    fn test_aggregate_many() {
        let err = CapsuleError::aggregate(vec![
            CapsuleError::msg("a"),
            CapsuleError::msg("b"),
            CapsuleError::msg("c"),
        ])
        .unwrap();
        assert_eq!(err.failure_count(), 3);
        assert_eq!(err.to_string(), "a (2 more stop failure(s) suppressed)");
    }

    #[test]
    fn test_other_is_transparent() {
        let io = std::io::Error::other("disk gone");
        let err = CapsuleError::other(io);
        assert_eq!(err.to_string(), "disk gone");
    }
}
