// ============================================================================
// spark-collections - Errors
// ============================================================================

use thiserror::Error;

use crate::events::SubscriberId;

/// Result alias used by every fallible collection operation.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Errors raised by observable collections.
///
/// Expected outcomes such as a rejected duplicate are *not* errors; they are
/// reported through the `Ok` value (`Ok(false)`, `Ok(None)`). This type is
/// reserved for programming errors and lifecycle violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The collection was disposed; it no longer accepts mutations or
    /// subscriptions.
    #[error("collection has been disposed")]
    Disposed,

    /// An argument was outside the range the operation accepts.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    /// A merge resolver, `retain` predicate or `update` closure tried to
    /// mutate the collection it was called for.
    #[error("collection `{collection}` was mutated from inside its own {operation} closure")]
    Reentrant {
        collection: &'static str,
        operation: &'static str,
    },

    /// A subscriber callback panicked while handling an event.
    ///
    /// Only ever logged and counted by the registry; mutators never see it.
    #[error("subscriber {subscriber} failed: {message}")]
    SubscriberFailure {
        subscriber: SubscriberId,
        message: String,
    },
}

impl CollectionError {
    pub(crate) fn invalid(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// Returns true for [`CollectionError::Disposed`].
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_message() {
        let err = CollectionError::invalid("size", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "invalid argument `size`: must be greater than zero"
        );
        assert!(!err.is_disposed());
    }

    #[test]
    fn reentrant_message() {
        let err = CollectionError::Reentrant {
            collection: "scores",
            operation: "merge_with",
        };
        assert_eq!(
            err.to_string(),
            "collection `scores` was mutated from inside its own merge_with closure"
        );
    }

    #[test]
    fn disposed_message() {
        assert_eq!(
            CollectionError::Disposed.to_string(),
            "collection has been disposed"
        );
        assert!(CollectionError::Disposed.is_disposed());
    }
}
