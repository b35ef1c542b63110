use futures::executor::block_on;
use futures::stream::{self, StreamExt};
use spark_collections::{ChangeKind, ObservableList, ObservableMap, ObservableSet};
use std::thread;

#[test]
fn test_subscription_is_a_stream() {
    let list = ObservableList::new();
    let events = list.subscribe().unwrap();

    list.push(1).unwrap();
    list.push(2).unwrap();
    list.dispose();

    let kinds: Vec<ChangeKind> = block_on(events.map(|e| e.kind()).collect());
    assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Add]);
}

#[test]
fn test_stream_waits_for_other_thread() {
    let set = std::sync::Arc::new(ObservableSet::new());
    let mut events = set.subscribe().unwrap();

    let writer = {
        let set = set.clone();
        thread::spawn(move || {
            for n in 0..3 {
                set.insert(n).unwrap();
            }
            set.dispose();
        })
    };

    let mut received = Vec::new();
    block_on(async {
        while let Some(event) = events.next().await {
            received.push(event.affected()[0]);
        }
    });
    writer.join().unwrap();

    received.sort_unstable();
    assert_eq!(received, vec![0, 1, 2]);
}

#[test]
fn test_extend_async_is_one_commit() {
    let list = ObservableList::from_vec(vec![0]);
    let mut events = list.subscribe().unwrap();

    let source = stream::iter(1..=4);
    let added = block_on(list.extend_async(source)).unwrap();

    assert_eq!(added, 4);
    assert_eq!(list.to_vec(), vec![0, 1, 2, 3, 4]);

    let events = events.drain_pending();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), ChangeKind::Bulk);
    assert_eq!(events[0].index(), Some(1));
}

#[test]
fn test_merge_with_async_resolves_collisions() {
    let map = ObservableMap::from_iter([("a", 1), ("b", 2)]);
    let source = stream::iter(vec![("a", 10), ("c", 3)]);

    let changed = block_on(map.merge_with_async(source, |old, new| old * new)).unwrap();
    assert_eq!(changed, 2);
    assert_eq!(map.get(&"a"), Some(10));
    assert_eq!(map.get(&"c"), Some(3));
}

#[test]
fn test_async_bulk_after_dispose_fails() {
    let set: ObservableSet<i32> = ObservableSet::new();
    set.dispose();

    let result = block_on(set.extend_async(stream::iter(vec![1, 2])));
    assert!(result.unwrap_err().is_disposed());
}

#[test]
fn test_try_next_event_does_not_block() {
    let list: ObservableList<i32> = ObservableList::new();
    let mut events = list.subscribe().unwrap();
    assert_eq!(events.try_next_event(), None);

    list.push(7).unwrap();
    let event = events.try_next_event().unwrap();
    assert_eq!(event.affected(), &[7]);
    assert_eq!(event.index(), Some(0));
}
