// ============================================================================
// spark-collections - Equality Strategies
// Ready-made `EqualsFn` builders for custom duplicate detection
// ============================================================================
//
// A strategy passed to a set or map only ever widens `Eq`: two values that
// are `Eq` always land on the same storage slot, whatever the strategy says.
// ============================================================================

use std::sync::Arc;

use crate::core::types::EqualsFn;

/// Plain `PartialEq` comparison.
///
/// ```
/// use spark_collections::core::equality::equals;
///
/// assert!(equals(&"rust", &"rust"));
/// assert!(!equals(&1, &2));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// [`equals`] packaged as a strategy, for APIs that take an [`EqualsFn`].
pub fn equals_strategy<T: PartialEq + 'static>() -> EqualsFn<T> {
    Arc::new(equals::<T>)
}

// =============================================================================
// PROJECTIONS
// =============================================================================

/// Treat items as duplicates when a projection of them matches.
///
/// A set built with `by_field(|u| u.id)` keeps one user per id.
///
/// ```
/// use spark_collections::{by_field, ObservableSet};
///
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// struct User { id: u32, name: String }
///
/// let users = ObservableSet::with_equality(by_field(|u: &User| u.id));
/// assert!(users.insert(User { id: 1, name: "Ada".into() }).unwrap());
/// assert!(!users.insert(User { id: 1, name: "Bob".into() }).unwrap());
/// ```
pub fn by_field<T, F, R>(project: F) -> EqualsFn<T>
where
    T: 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    R: PartialEq,
{
    Arc::new(move |a, b| project(a) == project(b))
}

/// ASCII case-insensitive comparison for anything string-like.
pub fn case_insensitive<T>() -> EqualsFn<T>
where
    T: AsRef<str> + 'static,
{
    Arc::new(|a: &T, b: &T| a.as_ref().eq_ignore_ascii_case(b.as_ref()))
}

// =============================================================================
// CONSTANT STRATEGIES
// =============================================================================

/// Adds no equivalences: only `Eq` decides.
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// Everything is equivalent; a set using it holds at most one element.
pub fn always_equals<T>(_a: &T, _b: &T) -> bool {
    true
}

/// [`never_equals`] as a strategy: a set or map built with it dedupes by
/// `Eq` alone.
pub fn never_equals_fn<T: 'static>() -> EqualsFn<T> {
    Arc::new(never_equals::<T>)
}

/// [`always_equals`] as a strategy; a set built with it keeps at most one
/// element.
pub fn always_equals_fn<T: 'static>() -> EqualsFn<T> {
    Arc::new(always_equals::<T>)
}

// =============================================================================
// TESTS
// =============================================================================
