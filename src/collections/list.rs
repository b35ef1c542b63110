// ============================================================================
// spark-collections - ObservableList
// A Vec behind a gate, publishing one change event per mutation
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures::stream::{Stream, StreamExt};

use crate::collections::gate::{observable_api, Gate};
use crate::collections::query::CollectionQuery;
use crate::core::error::{CollectionError, Result};
use crate::core::options::ObservableOptions;
use crate::core::types::{default_equals, EqualsFn};
use crate::events::ChangeEvent;

// =============================================================================
// OBSERVABLE LIST
// =============================================================================

/// An ordered, thread-safe list that reports every mutation.
///
/// Events carry the position they happened at:
/// - `push`/`insert`: `Add` with the new index
/// - `set`/`update`: `Update` with the index and the replaced item
/// - `remove`/`try_remove`/`pop`: `Remove` with the old index
/// - `extend`/`truncate`: `Bulk` with the first affected index
/// - `retain`: `Bulk` listing the removed items
/// - `clear`: `Clear` listing the removed items (only if non-empty)
///
/// The equality strategy is used by `contains`, `index_of` and `remove`.
///
/// # Example
///
/// ```
/// use spark_collections::{ChangeKind, ObservableList};
///
/// let items: ObservableList<String> = ObservableList::new();
/// let mut events = items.subscribe().unwrap();
///
/// items.push("first".to_string()).unwrap();
/// items.push("second".to_string()).unwrap();
/// assert_eq!(items.get(0), Some("first".to_string()));
/// assert_eq!(items.len(), 2);
///
/// let event = events.try_next_event().unwrap();
/// assert_eq!(event.kind(), ChangeKind::Add);
/// assert_eq!(event.index(), Some(0));
/// ```
pub struct ObservableList<T> {
    gate: Gate<Vec<T>, T>,
    equals: EqualsFn<T>,
}

impl<T> ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new empty list using `PartialEq`.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list that starts with `data` (no events for initial items).
    pub fn from_vec(data: Vec<T>) -> Self {
        Self::assemble(data, &ObservableOptions::default(), Arc::new(default_equals::<T>))
    }

    /// Create an empty list with custom options.
    pub fn with_options(options: ObservableOptions) -> Result<Self> {
        Self::build(Vec::new(), options, Arc::new(default_equals::<T>))
    }
}

impl<T> ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty list with a custom equality strategy.
    pub fn with_equality(equals: EqualsFn<T>) -> Self {
        Self::assemble(Vec::new(), &ObservableOptions::default(), equals)
    }

    /// Create a list from initial items, options and an equality strategy.
    ///
    /// Fails with `InvalidArgument` if the options do not validate.
    pub fn build(data: Vec<T>, options: ObservableOptions, equals: EqualsFn<T>) -> Result<Self> {
        options.validate()?;
        Ok(Self::assemble(data, &options, equals))
    }

    fn assemble(data: Vec<T>, options: &ObservableOptions, equals: EqualsFn<T>) -> Self {
        Self {
            gate: Gate::new(data, options),
            equals,
        }
    }

    fn out_of_range(index: usize, len: usize) -> CollectionError {
        CollectionError::invalid("index", format!("index {index} out of range for length {len}"))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.gate.read(Vec::len)
    }

    /// Returns true if the list contains no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.gate.read(|data| data.get(index).cloned())
    }

    /// Returns a copy of the first item.
    pub fn first(&self) -> Option<T> {
        self.gate.read(|data| data.first().cloned())
    }

    /// Returns a copy of the last item.
    pub fn last(&self) -> Option<T> {
        self.gate.read(|data| data.last().cloned())
    }

    /// Position of the first item equal to `item` under the list's equality.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.gate
            .read(|data| data.iter().position(|existing| (self.equals)(existing, item)))
    }

    /// True if an item equal to `item` exists.
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Snapshot of the items.
    pub fn to_vec(&self) -> Vec<T> {
        self.gate.read(Vec::clone)
    }

    // =========================================================================
    // PUSH / POP
    // =========================================================================

    /// Appends an item and returns its index.
    pub fn push(&self, item: T) -> Result<usize> {
        self.gate.mutate(|data| {
            let index = data.len();
            data.push(item.clone());
            Ok((index, Some(ChangeEvent::add(item, Some(index)))))
        })
    }

    /// Removes and returns the last item, or `None` if empty.
    pub fn pop(&self) -> Result<Option<T>> {
        self.gate.mutate(|data| match data.pop() {
            Some(item) => {
                let event = ChangeEvent::remove(item.clone(), Some(data.len()));
                Ok((Some(item), Some(event)))
            }
            None => Ok((None, None)),
        })
    }

    // =========================================================================
    // INSERT / SET / REMOVE
    // =========================================================================

    /// Inserts an item at `index`, shifting later items right.
    ///
    /// Fails with `InvalidArgument` if `index > len`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.gate.mutate(|data| {
            if index > data.len() {
                return Err(Self::out_of_range(index, data.len()));
            }
            data.insert(index, item.clone());
            Ok(((), Some(ChangeEvent::add(item, Some(index)))))
        })
    }

    /// Replaces the item at `index`, returning the old one.
    ///
    /// Fails with `InvalidArgument` if `index >= len`.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.gate.mutate(|data| {
            let len = data.len();
            let Some(slot) = data.get_mut(index) else {
                return Err(Self::out_of_range(index, len));
            };
            let old = std::mem::replace(slot, item.clone());
            let event = ChangeEvent::update(item, old.clone(), Some(index));
            Ok((old, Some(event)))
        })
    }

    /// Replaces the item at `index` with `f(current)`, returning the new
    /// item, or `None` (no event) if the index does not exist.
    ///
    /// `f` runs without the list locked and may read it. If another thread
    /// changes the list meanwhile, `f` is called again on the fresh item.
    pub fn update<F>(&self, index: usize, mut f: F) -> Result<Option<T>>
    where
        F: FnMut(&T) -> T,
    {
        self.gate.mutate_with(
            "update",
            |data| data.get(index).cloned(),
            |current| current.map(|old| {
                let new = f(&old);
                (old, new)
            }),
            |data, planned| {
                let Some((old, new)) = planned else {
                    return Ok((None, None));
                };
                if let Some(slot) = data.get_mut(index) {
                    *slot = new.clone();
                }
                let event = ChangeEvent::update(new.clone(), old, Some(index));
                Ok((Some(new), Some(event)))
            },
        )
    }

    /// Removes and returns the item at `index`, or `None` (no event) if the
    /// index does not exist.
    pub fn try_remove(&self, index: usize) -> Result<Option<T>> {
        self.gate.mutate(|data| {
            if index >= data.len() {
                return Ok((None, None));
            }
            let item = data.remove(index);
            let event = ChangeEvent::remove(item.clone(), Some(index));
            Ok((Some(item), Some(event)))
        })
    }

    /// Removes the first item equal to `item`. Returns whether one was
    /// removed.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.gate.mutate(|data| {
            let Some(index) = data.iter().position(|existing| (self.equals)(existing, item)) else {
                return Ok((false, None));
            };
            let removed = data.remove(index);
            Ok((true, Some(ChangeEvent::remove(removed, Some(index)))))
        })
    }

    // =========================================================================
    // BULK
    // =========================================================================

    /// Appends every item atomically. Returns how many were added; emits a
    /// single `Bulk` event (none if `items` is empty).
    pub fn extend<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        self.gate.mutate(|data| {
            if items.is_empty() {
                return Ok((0, None));
            }
            let start = data.len();
            data.extend(items.iter().cloned());
            let count = items.len();
            Ok((count, Some(ChangeEvent::bulk_at(items, start))))
        })
    }

    /// Collects `items` without holding the gate, then appends them like
    /// [`extend`](Self::extend).
    pub async fn extend_async<S>(&self, items: S) -> Result<usize>
    where
        S: Stream<Item = T>,
    {
        let items: Vec<T> = items.collect().await;
        self.extend(items)
    }

    /// Keeps the first `len` items and removes the rest as one `Bulk`
    /// event. Returns how many were removed.
    pub fn truncate(&self, len: usize) -> Result<usize> {
        self.gate.mutate(|data| {
            if len >= data.len() {
                return Ok((0, None));
            }
            let removed: Vec<T> = data.drain(len..).collect();
            let count = removed.len();
            Ok((count, Some(ChangeEvent::bulk_at(removed, len))))
        })
    }

    /// Removes every item for which `keep` returns false, atomically.
    /// Returns how many were removed.
    ///
    /// `keep` runs on a snapshot without the list locked, so it may read
    /// the list. If another thread changes the list meanwhile, the verdicts
    /// are computed again.
    pub fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.gate.mutate_with(
            "retain",
            Vec::clone,
            |items| items.iter().map(|item| keep(item)).collect::<Vec<bool>>(),
            |data, verdicts| {
                if verdicts.iter().all(|kept| *kept) {
                    return Ok((0, None));
                }
                let mut removed = Vec::new();
                let mut verdict = verdicts.into_iter();
                data.retain(|item| {
                    let kept = verdict.next().unwrap_or(true);
                    if !kept {
                        removed.push(item.clone());
                    }
                    kept
                });
                let count = removed.len();
                Ok((count, Some(ChangeEvent::bulk(removed, Vec::new()))))
            },
        )
    }

    /// Removes every item. Emits `Clear` only if the list was non-empty;
    /// returns whether anything was removed.
    pub fn clear(&self) -> Result<bool> {
        self.gate.mutate(|data| {
            if data.is_empty() {
                return Ok((false, None));
            }
            let removed = std::mem::take(data);
            Ok((true, Some(ChangeEvent::clear(removed))))
        })
    }

    // =========================================================================
    // TRANSFORMS (pure, no events)
    // =========================================================================

    /// New standalone list with the items matching `predicate`, sharing this
    /// list's equality strategy.
    pub fn filter<F>(&self, mut predicate: F) -> ObservableList<T>
    where
        F: FnMut(&T) -> bool,
    {
        let kept = self.to_vec().into_iter().filter(|item| predicate(item)).collect();
        ObservableList::assemble(kept, self.options(), self.equals.clone())
    }

    /// New standalone list with every item transformed.
    pub fn map<U, F>(&self, transform: F) -> ObservableList<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        F: FnMut(&T) -> U,
    {
        let mapped = self.to_vec().iter().map(transform).collect();
        ObservableList::<U>::assemble(
            mapped,
            self.options(),
            Arc::new(default_equals::<U>),
        )
    }

    /// Split a snapshot into `(matching, rest)`, preserving order.
    pub fn partition<F>(&self, mut predicate: F) -> (Vec<T>, Vec<T>)
    where
        F: FnMut(&T) -> bool,
    {
        self.to_vec().into_iter().partition(|item| predicate(item))
    }

    observable_api!(T);
}

impl<T> CollectionQuery for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn items(&self) -> Vec<T> {
        self.to_vec()
    }
}

impl<T> Default for ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> Clone for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        // Same data, fresh gate and no subscribers
        Self::assemble(
            self.to_vec(),
            self.options(),
            self.equals.clone(),
        )
    }
}

impl<T> fmt::Debug for ObservableList<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("gate", &self.gate)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
