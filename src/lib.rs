// ============================================================================
// spark-collections - Observable Collections for Rust
// ============================================================================
//
// Thread-safe list, map and set wrappers. Every mutation that changes the
// collection publishes exactly one ChangeEvent, and every subscriber sees
// those events in commit order.
// ============================================================================

//! Observable, concurrency-guarded collections.
//!
//! ```
//! use spark_collections::{ChangeKind, ObservableMap};
//!
//! let scores: ObservableMap<&str, u32> = ObservableMap::new();
//! let mut events = scores.subscribe().unwrap();
//!
//! scores.insert("ada", 10).unwrap();
//! scores.merge_with([("ada", 5), ("bob", 7)], |old, new| old + new).unwrap();
//!
//! let kinds: Vec<ChangeKind> = events.drain_pending().iter().map(|e| e.kind()).collect();
//! assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Bulk]);
//! assert_eq!(scores.get(&"ada"), Some(15));
//! ```

pub mod collections;
pub mod core;
pub mod events;
mod macros;

// Re-export core items at crate root for ergonomic access
pub use core::constants;
pub use core::equality::{
    always_equals, always_equals_fn, by_field, case_insensitive, equals, equals_strategy,
    never_equals, never_equals_fn,
};
pub use core::{
    default_equals, equals_fn, Backpressure, CollectionError, EqualsFn, ListenerFn,
    ObservableOptions, Result,
};

// Re-export events
pub use events::{
    BlockingIter, ChangeEvent, ChangeKind, SubscriberId, SubscriberRegistry, Subscription,
};

// Re-export collections
pub use collections::{CollectionQuery, ObservableList, ObservableMap, ObservableSet};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn one_event_per_successful_mutation() {
        let list = ObservableList::new();
        let mut events = list.subscribe().unwrap();

        list.push(1).unwrap();
        list.push(2).unwrap();
        assert!(!list.remove(&9).unwrap());
        list.set(0, 10).unwrap();
        list.extend([3, 4, 5]).unwrap();
        list.clear().unwrap();

        let kinds: Vec<ChangeKind> = events.drain_pending().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Add,
                ChangeKind::Add,
                ChangeKind::Update,
                ChangeKind::Bulk,
                ChangeKind::Clear,
            ]
        );
    }

    #[test]
    fn sequences_are_contiguous() {
        let set = ObservableSet::new();
        let mut events = set.subscribe().unwrap();

        for n in 0..10 {
            set.insert(n % 4).unwrap();
        }

        let sequences: Vec<u64> = events.drain_pending().iter().map(|e| e.sequence()).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(set.sequence(), 4);
    }

    #[test]
    fn late_subscriber_sees_no_replay() {
        let map = ObservableMap::new();
        map.insert("a", 1).unwrap();

        let mut late = map.subscribe().unwrap();
        assert!(late.drain_pending().is_empty());

        map.insert("b", 2).unwrap();
        let events = late.drain_pending();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].keys(), vec!["b"]);
    }

    #[test]
    fn callbacks_and_channels_agree() {
        let list = ObservableList::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        list.listen(move |event: &ChangeEvent<i32>| {
            sink.lock().unwrap().push(event.sequence());
        })
        .unwrap();
        let mut channel = list.subscribe().unwrap();

        list.push(1).unwrap();
        list.push(2).unwrap();

        let from_channel: Vec<u64> = channel.drain_pending().iter().map(|e| e.sequence()).collect();
        assert_eq!(*seen.lock().unwrap(), from_channel);
    }

    // =========================================================================
    // Failure isolation
    // =========================================================================

    #[test]
    fn panicking_listener_does_not_reach_mutator() {
        let set = ObservableSet::new();
        let healthy = Arc::new(AtomicUsize::new(0));

        set.listen(|_: &ChangeEvent<u8>| panic!("listener bug")).unwrap();
        let counter = healthy.clone();
        set.listen(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(set.insert(1).unwrap());
        assert!(set.insert(2).unwrap());

        assert_eq!(healthy.load(Ordering::SeqCst), 2);
        assert_eq!(set.subscriber_failures(), 2);
        assert_eq!(set.len(), 2);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn programming_errors_are_typed() {
        let list = ObservableList::from_vec(vec![1, 2]);
        assert!(matches!(
            list.insert(5, 0),
            Err(CollectionError::InvalidArgument { argument: "index", .. })
        ));
        assert!(matches!(
            list.chunked(0),
            Err(CollectionError::InvalidArgument { argument: "size", .. })
        ));
    }

    #[test]
    fn disposed_collections_reject_writes_but_allow_reads() {
        let map = ObservableMap::from_iter([(1, 'a')]);
        assert!(map.dispose());

        assert_eq!(map.insert(2, 'b'), Err(CollectionError::Disposed));
        assert!(map.subscribe().unwrap_err().is_disposed());
        assert_eq!(map.get(&1), Some('a'));
        assert_eq!(map.len(), 1);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn queries_work_on_every_variant() {
        let list = observable_list![1, 2, 3, 4];
        let set = observable_set![1, 2, 3, 4];
        let map = observable_map! { 1 => 1, 2 => 2, 3 => 3, 4 => 4 };

        assert_eq!(list.reduce(0, |acc, n| acc + n), 10);
        assert_eq!(set.count_where(|n| n % 2 == 0), 2);
        assert!(map.any(|(k, v)| k == v));
        assert!(map.all(|(_, v)| *v > 0));
    }
}
