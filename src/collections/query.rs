// ============================================================================
// spark-collections - Query Extensions
// Derived read-only operations shared by every observable collection
// ============================================================================
//
// Every method works on a snapshot taken through `items()`, so user closures
// never run while the collection is locked and may freely read (or even
// mutate) the source collection. None of them emit events.
// ============================================================================

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::core::error::{CollectionError, Result};

/// Read-only queries available on every observable collection.
///
/// Implementors only provide [`items`](Self::items); everything else is
/// derived from that snapshot.
///
/// # Example
///
/// ```
/// use spark_collections::{CollectionQuery, ObservableList};
///
/// let words = ObservableList::from_vec(vec!["apple", "avocado", "banana"]);
/// let by_letter = words.group_by(|w| w.chars().next());
/// assert_eq!(by_letter[&Some('a')], vec!["apple", "avocado"]);
/// assert_eq!(words.reduce(0, |acc, w| acc + w.len()), 18);
/// ```
pub trait CollectionQuery {
    /// Item yielded by the snapshot (`(K, V)` for maps).
    type Item: Clone;

    /// Snapshot of the current items in iteration order.
    fn items(&self) -> Vec<Self::Item>;

    /// Fold every item into an accumulator, starting from `initial`.
    fn reduce<A, F>(&self, initial: A, combine: F) -> A
    where
        F: FnMut(A, &Self::Item) -> A,
    {
        self.items().iter().fold(initial, combine)
    }

    /// Group items by a derived key, preserving iteration order inside each
    /// group.
    fn group_by<K, F>(&self, mut key_selector: F) -> HashMap<K, Vec<Self::Item>>
    where
        K: Eq + Hash,
        F: FnMut(&Self::Item) -> K,
    {
        let mut groups: HashMap<K, Vec<Self::Item>> = HashMap::new();
        for item in self.items() {
            groups.entry(key_selector(&item)).or_default().push(item);
        }
        groups
    }

    /// Keep the first item for every distinct derived key.
    fn distinct_by<K, F>(&self, mut key_selector: F) -> Vec<Self::Item>
    where
        K: Eq + Hash,
        F: FnMut(&Self::Item) -> K,
    {
        let mut seen = HashSet::new();
        self.items()
            .into_iter()
            .filter(|item| seen.insert(key_selector(item)))
            .collect()
    }

    /// Build a map from every item. Later items win on key collisions.
    fn associate<K, V, F>(&self, transform: F) -> HashMap<K, V>
    where
        K: Eq + Hash,
        F: FnMut(&Self::Item) -> (K, V),
    {
        self.items().iter().map(transform).collect()
    }

    /// Split the snapshot into chunks of `size` items; the last chunk may be
    /// shorter.
    ///
    /// Fails with `InvalidArgument` when `size` is zero.
    fn chunked(&self, size: usize) -> Result<Vec<Vec<Self::Item>>> {
        if size == 0 {
            return Err(CollectionError::invalid(
                "size",
                "chunk size must be greater than zero",
            ));
        }
        Ok(self.items().chunks(size).map(<[Self::Item]>::to_vec).collect())
    }

    /// Number of items matching `predicate`.
    fn count_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&Self::Item) -> bool,
    {
        self.items().iter().filter(|item| predicate(*item)).count()
    }

    /// First item matching `predicate`.
    fn find<F>(&self, mut predicate: F) -> Option<Self::Item>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        self.items().into_iter().find(|item| predicate(item))
    }

    /// True if any item matches `predicate` (false when empty).
    fn any<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&Self::Item) -> bool,
    {
        self.items().iter().any(predicate)
    }

    /// True if every item matches `predicate` (true when empty).
    fn all<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&Self::Item) -> bool,
    {
        self.items().iter().all(predicate)
    }
}

// =============================================================================
// TESTS
// =============================================================================
