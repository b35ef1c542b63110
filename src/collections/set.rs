// ============================================================================
// spark-collections - ObservableSet
// A HashSet behind a gate, publishing one change event per mutation
// ============================================================================

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use futures::stream::{Stream, StreamExt};

use crate::collections::gate::{observable_api, Gate};
use crate::collections::query::CollectionQuery;
use crate::core::error::Result;
use crate::core::options::ObservableOptions;
use crate::core::types::EqualsFn;
use crate::events::ChangeEvent;

/// Find the stored element equivalent to `item`.
///
/// An `Eq`-identical element always matches since storage cannot hold both.
/// A custom strategy can only widen that, by scanning the stored elements.
fn resolve<T>(data: &HashSet<T>, item: &T, equals: Option<&EqualsFn<T>>) -> Option<T>
where
    T: Eq + Hash + Clone,
{
    if let Some(stored) = data.get(item) {
        return Some(stored.clone());
    }
    let equals = equals?;
    data.iter().find(|stored| equals(stored, item)).cloned()
}

// =============================================================================
// OBSERVABLE SET
// =============================================================================

/// A thread-safe set of unique elements that reports every mutation.
///
/// Uniqueness follows `Eq`/`Hash` by default. A custom equality strategy
/// adds equivalences on top: a new element is also a duplicate if the
/// strategy matches it against any stored element, and the stored element
/// wins.
///
/// Inserting a duplicate is not an error: it returns `Ok(false)` and emits
/// nothing.
///
/// # Example
///
/// ```
/// use spark_collections::ObservableSet;
///
/// let tags: ObservableSet<&str> = ObservableSet::new();
/// assert!(tags.insert("rust").unwrap());
/// assert!(!tags.insert("rust").unwrap());
///
/// assert_eq!(tags.extend(["rust", "async", "async"]).unwrap(), 1);
/// assert_eq!(tags.len(), 2);
/// ```
pub struct ObservableSet<T> {
    gate: Gate<HashSet<T>, T>,
    equals: Option<EqualsFn<T>>,
}

impl<T> ObservableSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::assemble(HashSet::new(), &ObservableOptions::default(), None)
    }

    /// Create a set that starts with `data` (no events for initial elements).
    pub fn from_set(data: HashSet<T>) -> Self {
        Self::assemble(data, &ObservableOptions::default(), None)
    }

    /// Create an empty set that decides duplicates with `equals`.
    pub fn with_equality(equals: EqualsFn<T>) -> Self {
        Self::assemble(HashSet::new(), &ObservableOptions::default(), Some(equals))
    }

    /// Create an empty set with custom options.
    pub fn with_options(options: ObservableOptions) -> Result<Self> {
        Self::build(HashSet::new(), options, None)
    }

    /// Create a set from initial elements, options and an optional equality
    /// strategy.
    pub fn build(data: HashSet<T>, options: ObservableOptions, equals: Option<EqualsFn<T>>) -> Result<Self> {
        options.validate()?;
        Ok(Self::assemble(data, &options, equals))
    }

    fn assemble(data: HashSet<T>, options: &ObservableOptions, equals: Option<EqualsFn<T>>) -> Self {
        Self {
            gate: Gate::new(data, options),
            equals,
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.gate.read(HashSet::len)
    }

    /// Returns true if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if an equivalent element is stored.
    pub fn contains(&self, item: &T) -> bool {
        self.gate
            .read(|data| resolve(data, item, self.equals.as_ref()).is_some())
    }

    /// Snapshot of the set.
    pub fn to_set(&self) -> HashSet<T> {
        self.gate.read(HashSet::clone)
    }

    /// Snapshot of the elements in iteration order.
    pub fn to_vec(&self) -> Vec<T> {
        self.gate.read(|data| data.iter().cloned().collect())
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Inserts an element. Returns false (no event) if an equivalent element
    /// is already present.
    pub fn insert(&self, item: T) -> Result<bool> {
        self.gate.mutate(|data| {
            if resolve(data, &item, self.equals.as_ref()).is_some() {
                return Ok((false, None));
            }
            data.insert(item.clone());
            Ok((true, Some(ChangeEvent::add(item, None))))
        })
    }

    /// Inserts every new element atomically. Duplicates (against the set or
    /// earlier in the batch) are skipped. Returns how many were added; emits
    /// one `Bulk` event with just those, or nothing if none were new.
    pub fn extend<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        self.gate.mutate(|data| {
            let mut added: Vec<T> = Vec::new();
            for item in items {
                let in_batch = match &self.equals {
                    None => added.contains(&item),
                    Some(equals) => added.iter().any(|a| *a == item || equals(a, &item)),
                };
                if in_batch || resolve(data, &item, self.equals.as_ref()).is_some() {
                    continue;
                }
                added.push(item);
            }
            if added.is_empty() {
                return Ok((0, None));
            }
            data.extend(added.iter().cloned());
            let count = added.len();
            Ok((count, Some(ChangeEvent::bulk(added, Vec::new()))))
        })
    }

    /// Collects `items` without holding the gate, then inserts them like
    /// [`extend`](Self::extend).
    pub async fn extend_async<S>(&self, items: S) -> Result<usize>
    where
        S: Stream<Item = T>,
    {
        let items: Vec<T> = items.collect().await;
        self.extend(items)
    }

    /// Removes the element equivalent to `item`. The event carries the stored
    /// element.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.gate.mutate(|data| {
            let Some(stored) = resolve(data, item, self.equals.as_ref()) else {
                return Ok((false, None));
            };
            data.remove(&stored);
            Ok((true, Some(ChangeEvent::remove(stored, None))))
        })
    }

    /// Removes every element for which `keep` returns false, atomically.
    ///
    /// `keep` runs on a snapshot without the set locked.
    pub fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.gate.mutate_with(
            "retain",
            |data| data.iter().cloned().collect::<Vec<T>>(),
            |items| items.into_iter().filter(|item| !keep(item)).collect::<Vec<T>>(),
            |data, doomed| {
                if doomed.is_empty() {
                    return Ok((0, None));
                }
                for item in &doomed {
                    data.remove(item);
                }
                let count = doomed.len();
                Ok((count, Some(ChangeEvent::bulk(doomed, Vec::new()))))
            },
        )
    }

    /// Removes every element. Emits `Clear` only if the set was non-empty.
    pub fn clear(&self) -> Result<bool> {
        self.gate.mutate(|data| {
            if data.is_empty() {
                return Ok((false, None));
            }
            let removed: Vec<T> = data.drain().collect();
            Ok((true, Some(ChangeEvent::clear(removed))))
        })
    }

    // =========================================================================
    // TRANSFORMS (pure, no events)
    // =========================================================================

    /// New standalone set with the matching elements and the same equality.
    pub fn filter<F>(&self, mut predicate: F) -> ObservableSet<T>
    where
        F: FnMut(&T) -> bool,
    {
        let kept = self.to_set().into_iter().filter(|item| predicate(item)).collect();
        Self::assemble(kept, self.options(), self.equals.clone())
    }

    /// New standalone set of transformed elements. Elements that map to the
    /// same value collapse into one.
    pub fn map<U, F>(&self, transform: F) -> ObservableSet<U>
    where
        U: Eq + Hash + Clone + Send + Sync + 'static,
        F: FnMut(&T) -> U,
    {
        let mapped = self.to_vec().iter().map(transform).collect();
        ObservableSet::assemble(mapped, self.options(), None)
    }

    /// Split a snapshot into `(matching, rest)`. The halves are disjoint and
    /// their union is the snapshot.
    pub fn partition<F>(&self, mut predicate: F) -> (HashSet<T>, HashSet<T>)
    where
        F: FnMut(&T) -> bool,
    {
        self.to_set().into_iter().partition(|item| predicate(item))
    }

    // =========================================================================
    // SET ALGEBRA (snapshots, no events)
    // =========================================================================
    //
    // `other` is snapshotted before this set is read so two gates are never
    // held together.

    /// Elements in either set.
    pub fn union(&self, other: &ObservableSet<T>) -> HashSet<T> {
        let theirs = other.to_set();
        let mut ours = self.to_set();
        ours.extend(theirs);
        ours
    }

    /// Elements in both sets.
    pub fn intersection(&self, other: &ObservableSet<T>) -> HashSet<T> {
        let theirs = other.to_set();
        self.to_set().into_iter().filter(|item| theirs.contains(item)).collect()
    }

    /// Elements in this set but not in `other`.
    pub fn difference(&self, other: &ObservableSet<T>) -> HashSet<T> {
        let theirs = other.to_set();
        self.to_set().into_iter().filter(|item| !theirs.contains(item)).collect()
    }

    observable_api!(T);
}

impl<T> CollectionQuery for ObservableSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    type Item = T;

    fn items(&self) -> Vec<T> {
        self.to_vec()
    }
}

impl<T> Default for ObservableSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ObservableSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_set(iter.into_iter().collect())
    }
}

impl<T> Clone for ObservableSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self::assemble(self.to_set(), self.options(), self.equals.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableSet")
            .field("gate", &self.gate)
            .field("custom_equality", &self.equals.is_some())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
