// ============================================================================
// spark-collections - ObservableMap
// A HashMap behind a gate, publishing one change event per mutation
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use futures::stream::{Stream, StreamExt};

use crate::collections::gate::{observable_api, Gate};
use crate::collections::query::CollectionQuery;
use crate::core::error::Result;
use crate::core::options::ObservableOptions;
use crate::core::types::EqualsFn;
use crate::events::ChangeEvent;

// =============================================================================
// KEY RESOLUTION
// =============================================================================

/// Find the stored key equivalent to `key`.
///
/// A hash lookup comes first: a key `Eq` to a stored one is always the same
/// entry. With a custom strategy the stored keys are then scanned.
fn resolve_key<K, V>(data: &HashMap<K, V>, key: &K, key_equals: Option<&EqualsFn<K>>) -> Option<K>
where
    K: Eq + Hash + Clone,
{
    if let Some((stored, _)) = data.get_key_value(key) {
        return Some(stored.clone());
    }
    let equals = key_equals?;
    data.keys().find(|stored| equals(stored, key)).cloned()
}

// =============================================================================
// OBSERVABLE MAP
// =============================================================================

/// A thread-safe map that reports every mutation.
///
/// Events carry `(key, value)` entries:
/// - `insert` of a new key: `Add`
/// - `insert` over an existing key, `update`: `Update` (old entry in
///   `previous`)
/// - `remove`: `Remove` with the removed entry
/// - `merge`/`merge_with`/`retain`: one `Bulk` event
/// - `clear`: `Clear` with every removed entry (only if non-empty)
///
/// An optional key-equality strategy widens `Eq` when deciding whether two
/// keys are the same entry. Values never need to be comparable.
///
/// # Example
///
/// ```
/// use spark_collections::ObservableMap;
///
/// let users: ObservableMap<String, u32> = ObservableMap::new();
/// users.insert("alice".to_string(), 25).unwrap();
/// users.insert("bob".to_string(), 30).unwrap();
///
/// assert_eq!(users.get(&"alice".to_string()), Some(25));
/// assert_eq!(users.len(), 2);
///
/// // Duplicate keys are rejected without an event
/// assert!(!users.try_insert("bob".to_string(), 31).unwrap());
/// ```
pub struct ObservableMap<K, V> {
    gate: Gate<HashMap<K, V>, (K, V)>,
    key_equals: Option<EqualsFn<K>>,
}

impl<K, V> ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new empty map using `Eq` for keys.
    pub fn new() -> Self {
        Self::assemble(HashMap::new(), &ObservableOptions::default(), None)
    }

    /// Create a map that starts with `data` (no events for initial entries).
    pub fn from_map(data: HashMap<K, V>) -> Self {
        Self::assemble(data, &ObservableOptions::default(), None)
    }

    /// Create an empty map whose keys are compared with `key_equals`.
    pub fn with_key_equality(key_equals: EqualsFn<K>) -> Self {
        Self::assemble(HashMap::new(), &ObservableOptions::default(), Some(key_equals))
    }

    /// Create an empty map with custom options.
    pub fn with_options(options: ObservableOptions) -> Result<Self> {
        Self::build(HashMap::new(), options, None)
    }

    /// Create a map from initial entries, options and an optional key
    /// equality strategy.
    ///
    /// Fails with `InvalidArgument` if the options do not validate.
    pub fn build(
        data: HashMap<K, V>,
        options: ObservableOptions,
        key_equals: Option<EqualsFn<K>>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::assemble(data, &options, key_equals))
    }

    fn assemble(data: HashMap<K, V>, options: &ObservableOptions, key_equals: Option<EqualsFn<K>>) -> Self {
        Self {
            gate: Gate::new(data, options),
            key_equals,
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.gate.read(HashMap::len)
    }

    /// Returns true if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.gate.read(|data| {
            resolve_key(data, key, self.key_equals.as_ref()).and_then(|stored| data.get(&stored).cloned())
        })
    }

    /// True if an entry exists for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.gate
            .read(|data| resolve_key(data, key, self.key_equals.as_ref()).is_some())
    }

    /// Snapshot of the keys.
    pub fn keys(&self) -> Vec<K> {
        self.gate.read(|data| data.keys().cloned().collect())
    }

    /// Snapshot of the values.
    pub fn values(&self) -> Vec<V> {
        self.gate.read(|data| data.values().cloned().collect())
    }

    /// Snapshot of the entries.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.gate
            .read(|data| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Snapshot of the whole map.
    pub fn to_map(&self) -> HashMap<K, V> {
        self.gate.read(HashMap::clone)
    }

    // =========================================================================
    // INSERT (set)
    // =========================================================================

    /// Inserts or overwrites an entry, returning the previous value.
    ///
    /// With a custom key strategy, an equivalent stored key keeps its
    /// original form and only the value changes.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        self.gate.mutate(|data| {
            match resolve_key(data, &key, self.key_equals.as_ref()) {
                Some(stored) => {
                    let old = data.insert(stored.clone(), value.clone());
                    let event = old
                        .clone()
                        .map(|old| ChangeEvent::update((stored.clone(), value.clone()), (stored, old), None));
                    Ok((old, event))
                }
                None => {
                    data.insert(key.clone(), value.clone());
                    Ok((None, Some(ChangeEvent::add((key, value), None))))
                }
            }
        })
    }

    /// Inserts only if no equivalent key exists. Returns false (and emits
    /// nothing) on a duplicate.
    pub fn try_insert(&self, key: K, value: V) -> Result<bool> {
        self.gate.mutate(|data| {
            if resolve_key(data, &key, self.key_equals.as_ref()).is_some() {
                return Ok((false, None));
            }
            data.insert(key.clone(), value.clone());
            Ok((true, Some(ChangeEvent::add((key, value), None))))
        })
    }

    /// Replaces the value under `key` with `f(current)` and returns the new
    /// value, or `None` (no event) if the key is absent.
    ///
    /// `f` runs without the map locked and may read it. If another thread
    /// changes the map meanwhile, `f` is called again on the fresh value.
    pub fn update<F>(&self, key: &K, mut f: F) -> Result<Option<V>>
    where
        F: FnMut(&V) -> V,
    {
        self.gate.mutate_with(
            "update",
            |data| {
                let stored = resolve_key(data, key, self.key_equals.as_ref())?;
                let value = data.get(&stored)?.clone();
                Some((stored, value))
            },
            |current| current.map(|(stored, old)| {
                let new = f(&old);
                (stored, old, new)
            }),
            |data, planned| {
                let Some((stored, old, new)) = planned else {
                    return Ok((None, None));
                };
                data.insert(stored.clone(), new.clone());
                let event = ChangeEvent::update((stored.clone(), new.clone()), (stored, old), None);
                Ok((Some(new), Some(event)))
            },
        )
    }

    // =========================================================================
    // MERGE
    // =========================================================================

    /// Merges `entries` atomically; incoming values overwrite existing ones.
    /// Returns how many keys were added or changed and emits one `Bulk` event.
    pub fn merge<I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.merge_with(entries, |_, incoming| incoming.clone())
    }

    /// Merges `entries` atomically, calling `resolve(existing, incoming)` on
    /// key collisions. Returns how many keys were added or changed and emits
    /// one `Bulk` event listing them in first-touch order (none if
    /// `entries` is empty).
    ///
    /// The resolver runs without the map locked and may read it. Every
    /// merged value is computed before storage is written, so a panicking
    /// resolver leaves the map unchanged. If another thread changes the map
    /// meanwhile, the merge is computed again.
    pub fn merge_with<I, F>(&self, entries: I, mut resolve: F) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        F: FnMut(&V, &V) -> V,
    {
        let incoming: Vec<(K, V)> = entries.into_iter().collect();
        self.gate.mutate_with(
            "merge_with",
            |data| {
                // Stored key (or the incoming one) and current value per entry
                incoming
                    .iter()
                    .map(|(key, _)| match resolve_key(data, key, self.key_equals.as_ref()) {
                        Some(stored) => {
                            let existing = data.get(&stored).cloned();
                            (stored, existing)
                        }
                        None => (key.clone(), None),
                    })
                    .collect::<Vec<(K, Option<V>)>>()
            },
            |targets| {
                let mut staged: Vec<(K, V)> = Vec::new();
                for ((target, existing), (_, value)) in targets.into_iter().zip(&incoming) {
                    let slot = match &self.key_equals {
                        None => staged.iter().position(|(k, _)| *k == target),
                        Some(equals) => staged
                            .iter()
                            .position(|(k, _)| *k == target || equals(k, &target)),
                    };
                    match slot {
                        Some(position) => {
                            let merged = resolve(&staged[position].1, value);
                            staged[position].1 = merged;
                        }
                        None => {
                            let merged = match &existing {
                                Some(existing) => resolve(existing, value),
                                None => value.clone(),
                            };
                            staged.push((target, merged));
                        }
                    }
                }
                staged
            },
            |data, staged| {
                if staged.is_empty() {
                    return Ok((0, None));
                }
                let mut previous = Vec::new();
                for (key, value) in &staged {
                    if let Some(old) = data.insert(key.clone(), value.clone()) {
                        previous.push((key.clone(), old));
                    }
                }
                let count = staged.len();
                Ok((count, Some(ChangeEvent::bulk(staged, previous))))
            },
        )
    }

    /// Collects `entries` without holding the gate, then merges them like
    /// [`merge`](Self::merge).
    pub async fn merge_async<S>(&self, entries: S) -> Result<usize>
    where
        S: Stream<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.collect().await;
        self.merge(entries)
    }

    /// Collects `entries` without holding the gate, then merges them like
    /// [`merge_with`](Self::merge_with).
    pub async fn merge_with_async<S, F>(&self, entries: S, resolve: F) -> Result<usize>
    where
        S: Stream<Item = (K, V)>,
        F: FnMut(&V, &V) -> V,
    {
        let entries: Vec<(K, V)> = entries.collect().await;
        self.merge_with(entries, resolve)
    }

    // =========================================================================
    // REMOVE (delete)
    // =========================================================================

    /// Removes the entry for `key`, returning its value.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.gate.mutate(|data| {
            let Some(stored) = resolve_key(data, key, self.key_equals.as_ref()) else {
                return Ok((None, None));
            };
            match data.remove(&stored) {
                Some(value) => {
                    let event = ChangeEvent::remove((stored, value.clone()), None);
                    Ok((Some(value), Some(event)))
                }
                None => Ok((None, None)),
            }
        })
    }

    /// Removes every entry for which `keep` returns false, atomically.
    /// Returns how many were removed.
    ///
    /// `keep` runs on a snapshot without the map locked, so it may read the
    /// map. If another thread changes the map meanwhile, the verdicts are
    /// computed again.
    pub fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.gate.mutate_with(
            "retain",
            |data| {
                data.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<(K, V)>>()
            },
            |entries| {
                entries
                    .into_iter()
                    .filter(|(k, v)| !keep(k, v))
                    .map(|(k, _)| k)
                    .collect::<Vec<K>>()
            },
            |data, doomed| {
                if doomed.is_empty() {
                    return Ok((0, None));
                }
                let removed: Vec<(K, V)> = doomed
                    .into_iter()
                    .filter_map(|k| data.remove(&k).map(|v| (k, v)))
                    .collect();
                let count = removed.len();
                Ok((count, Some(ChangeEvent::bulk(removed, Vec::new()))))
            },
        )
    }

    // =========================================================================
    // CLEAR
    // =========================================================================

    /// Removes every entry. Emits `Clear` only if the map was non-empty;
    /// returns whether anything was removed.
    pub fn clear(&self) -> Result<bool> {
        self.gate.mutate(|data| {
            if data.is_empty() {
                return Ok((false, None));
            }
            let removed: Vec<(K, V)> = data.drain().collect();
            Ok((true, Some(ChangeEvent::clear(removed))))
        })
    }

    // =========================================================================
    // TRANSFORMS (pure, no events)
    // =========================================================================

    /// New standalone map with the entries matching `predicate`, sharing this
    /// map's key strategy.
    pub fn filter<F>(&self, mut predicate: F) -> ObservableMap<K, V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let kept = self.to_map().into_iter().filter(|(k, v)| predicate(k, v)).collect();
        Self::assemble(kept, self.options(), self.key_equals.clone())
    }

    /// New standalone map with every value transformed.
    pub fn map_values<U, F>(&self, mut transform: F) -> ObservableMap<K, U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnMut(&K, &V) -> U,
    {
        let mapped = self
            .to_map()
            .into_iter()
            .map(|(k, v)| {
                let u = transform(&k, &v);
                (k, u)
            })
            .collect();
        ObservableMap::assemble(mapped, self.options(), self.key_equals.clone())
    }

    /// New standalone map built from transformed entries. Later entries win
    /// when two map to the same key.
    pub fn map<K2, V2, F>(&self, mut transform: F) -> ObservableMap<K2, V2>
    where
        K2: Eq + Hash + Clone + Send + Sync + 'static,
        V2: Clone + Send + Sync + 'static,
        F: FnMut(&K, &V) -> (K2, V2),
    {
        let mapped = self.entries().iter().map(|(k, v)| transform(k, v)).collect();
        ObservableMap::assemble(mapped, self.options(), None)
    }

    /// Split a snapshot into `(matching, rest)`.
    pub fn partition<F>(&self, mut predicate: F) -> (HashMap<K, V>, HashMap<K, V>)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.to_map().into_iter().partition(|(k, v)| predicate(k, v))
    }

    observable_api!((K, V));
}

impl<K, V> CollectionQuery for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = (K, V);

    fn items(&self) -> Vec<(K, V)> {
        self.entries()
    }
}

impl<K, V> Default for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl<K, V> Clone for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        // Same data, fresh gate and no subscribers
        Self::assemble(
            self.to_map(),
            self.options(),
            self.key_equals.clone(),
        )
    }
}

impl<K, V> fmt::Debug for ObservableMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableMap")
            .field("gate", &self.gate)
            .field("custom_key_equality", &self.key_equals.is_some())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
