// ============================================================================
// spark-collections - Core Types
// Shared type aliases for injected strategies
// ============================================================================

use std::sync::Arc;

// =============================================================================
// EQUALITY STRATEGY
// =============================================================================

/// Equality strategy used to decide whether two items are duplicates.
///
/// Sets compare elements with it, maps compare keys with it, lists use it for
/// `contains`/`index_of`/`remove`. It may be called while the collection's
/// gate is held, so it must be pure and must not touch the collection.
pub type EqualsFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Wrap a closure as an [`EqualsFn`].
///
/// # Example
///
/// ```
/// use spark_collections::core::types::equals_fn;
///
/// let same_len = equals_fn(|a: &String, b: &String| a.len() == b.len());
/// assert!(same_len(&"abc".to_string(), &"xyz".to_string()));
/// ```
pub fn equals_fn<T, F>(f: F) -> EqualsFn<T>
where
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Listener callback registered through `listen`.
pub type ListenerFn<E> = Arc<dyn Fn(&E) + Send + Sync>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_equals_uses_partial_eq() {
        assert!(default_equals(&1, &1));
        assert!(!default_equals(&1, &2));
    }

    #[test]
    fn equals_fn_is_shareable() {
        let eq: EqualsFn<i32> = equals_fn(|a: &i32, b: &i32| a % 10 == b % 10);
        let other = eq.clone();
        assert!(eq(&1, &11));
        assert!(!other(&1, &12));
    }
}
