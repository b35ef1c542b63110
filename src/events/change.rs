// ============================================================================
// spark-collections - Change Events
// Immutable records describing one committed mutation
// ============================================================================

use std::sync::Arc;

// =============================================================================
// CHANGE KIND
// =============================================================================

/// The kind of mutation a [`ChangeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A single item (or entry) was inserted.
    Add,
    /// A single item (or entry) was removed.
    Remove,
    /// An existing position or key received a new value.
    Update,
    /// Every item was removed at once.
    Clear,
    /// Several items changed atomically (extend, merge, retain).
    Bulk,
}

impl ChangeKind {
    /// Returns `true` for [`ChangeKind::Add`].
    #[must_use]
    #[inline]
    pub const fn is_add(&self) -> bool {
        matches!(self, Self::Add)
    }

    /// Returns `true` for [`ChangeKind::Remove`].
    #[must_use]
    #[inline]
    pub const fn is_remove(&self) -> bool {
        matches!(self, Self::Remove)
    }

    /// Returns `true` for [`ChangeKind::Update`].
    #[must_use]
    #[inline]
    pub const fn is_update(&self) -> bool {
        matches!(self, Self::Update)
    }

    /// Returns `true` for [`ChangeKind::Clear`].
    #[must_use]
    #[inline]
    pub const fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }

    /// Returns `true` for [`ChangeKind::Bulk`].
    #[must_use]
    #[inline]
    pub const fn is_bulk(&self) -> bool {
        matches!(self, Self::Bulk)
    }
}

// =============================================================================
// CHANGE EVENT
// =============================================================================

/// One committed mutation.
///
/// Item payloads are shared behind `Arc`, so fanning an event out to many
/// subscribers clones pointers, not items. For maps the item type is the
/// `(key, value)` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<T> {
    kind: ChangeKind,
    affected: Arc<[T]>,
    previous: Arc<[T]>,
    index: Option<usize>,
    sequence: u64,
}

impl<T> ChangeEvent<T> {
    fn build(kind: ChangeKind, affected: Vec<T>, previous: Vec<T>, index: Option<usize>) -> Self {
        Self {
            kind,
            affected: affected.into(),
            previous: previous.into(),
            index,
            sequence: 0,
        }
    }

    pub(crate) fn add(item: T, index: Option<usize>) -> Self {
        Self::build(ChangeKind::Add, vec![item], Vec::new(), index)
    }

    pub(crate) fn remove(item: T, index: Option<usize>) -> Self {
        Self::build(ChangeKind::Remove, vec![item], Vec::new(), index)
    }

    pub(crate) fn update(item: T, previous: T, index: Option<usize>) -> Self {
        Self::build(ChangeKind::Update, vec![item], vec![previous], index)
    }

    pub(crate) fn clear(removed: Vec<T>) -> Self {
        Self::build(ChangeKind::Clear, removed, Vec::new(), None)
    }

    pub(crate) fn bulk(affected: Vec<T>, previous: Vec<T>) -> Self {
        Self::build(ChangeKind::Bulk, affected, previous, None)
    }

    /// Bulk change whose items are contiguous from `start` (list extend and
    /// truncate).
    pub(crate) fn bulk_at(affected: Vec<T>, start: usize) -> Self {
        Self::build(ChangeKind::Bulk, affected, Vec::new(), Some(start))
    }

    /// Stamp the commit sequence. Called by the gate exactly once.
    pub(crate) fn sequenced(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// What kind of mutation this was.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// The items the mutation produced or removed.
    ///
    /// - `Add`/`Update`: the new item
    /// - `Remove`: the removed item
    /// - `Clear`: every removed item
    /// - `Bulk`: every added, updated or removed item
    pub fn affected(&self) -> &[T] {
        &self.affected
    }

    /// Values that were overwritten: the old item of an `Update`, or the old
    /// entries of keys a `Bulk` merge replaced. Empty otherwise.
    pub fn previous(&self) -> &[T] {
        &self.previous
    }

    /// Position context for list mutations.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Commit sequence number, starting at 1 and strictly increasing per
    /// collection.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of affected items.
    pub fn len(&self) -> usize {
        self.affected.len()
    }

    /// True when no items are attached (never the case for committed events).
    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }
}

impl<K: Clone, V> ChangeEvent<(K, V)> {
    /// Keys of the affected map entries, in event order.
    pub fn keys(&self) -> Vec<K> {
        self.affected.iter().map(|(k, _)| k.clone()).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert!(ChangeEvent::add(1, None).kind().is_add());
        assert!(ChangeEvent::remove(1, Some(0)).kind().is_remove());
        assert!(ChangeEvent::update(2, 1, Some(0)).kind().is_update());
        assert!(ChangeEvent::clear(vec![1, 2]).kind().is_clear());
        assert!(ChangeEvent::bulk(vec![1, 2], vec![]).kind().is_bulk());
    }

    #[test]
    fn update_keeps_previous_value() {
        let event = ChangeEvent::update("new", "old", Some(3));
        assert_eq!(event.affected(), &["new"]);
        assert_eq!(event.previous(), &["old"]);
        assert_eq!(event.index(), Some(3));
    }

    #[test]
    fn sequence_is_stamped_once() {
        let event = ChangeEvent::add(5, None);
        assert_eq!(event.sequence(), 0);
        assert_eq!(event.sequenced(7).sequence(), 7);
    }

    #[test]
    fn clones_share_payload() {
        let event = ChangeEvent::bulk(vec![String::from("a"), String::from("b")], vec![]);
        let copy = event.clone();
        assert!(Arc::ptr_eq(&event.affected, &copy.affected));
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn map_event_keys() {
        let event = ChangeEvent::bulk(vec![(2, "Two/Deux"), (4, "Four")], vec![(2, "Two")]);
        assert_eq!(event.keys(), vec![2, 4]);
    }
}
