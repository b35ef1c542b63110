use spark_collections::{
    by_field, case_insensitive, observable_list, observable_map, observable_set, ChangeKind,
    CollectionQuery, ObservableList, ObservableSet,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct User {
    id: u32,
    name: String,
}

fn user(id: u32, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

#[test]
fn test_macros_build_collections() {
    let list = observable_list!["b", "a", "c"];
    let set = observable_set![3, 1, 3];
    let map = observable_map! { "x" => 1, "y" => 2 };

    assert_eq!(list.to_vec(), vec!["b", "a", "c"]);
    assert_eq!(set.len(), 2);
    assert_eq!(map.get(&"y"), Some(2));
}

#[test]
fn test_users_unique_by_id() {
    let users = ObservableSet::with_equality(by_field(|u: &User| u.id));
    let mut events = users.subscribe().unwrap();

    assert!(users.insert(user(1, "Ada")).unwrap());
    assert!(!users.insert(user(1, "Ada Lovelace")).unwrap());
    assert_eq!(users.extend([user(2, "Bob"), user(1, "Imposter"), user(3, "Cy")]).unwrap(), 2);

    assert_eq!(users.len(), 3);
    let names: Vec<String> = users
        .find(|u| u.id == 1)
        .map(|u| u.name)
        .into_iter()
        .collect();
    assert_eq!(names, vec!["Ada".to_string()]);

    let kinds: Vec<ChangeKind> = events.drain_pending().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Bulk]);
}

#[test]
fn test_case_insensitive_list_remove() {
    let list = ObservableList::with_equality(case_insensitive::<String>());
    list.extend(["Alpha".to_string(), "Beta".to_string()]).unwrap();

    assert!(list.contains(&"BETA".to_string()));
    assert_eq!(list.index_of(&"alpha".to_string()), Some(0));
    assert!(list.remove(&"ALPHA".to_string()).unwrap());
    assert_eq!(list.to_vec(), vec!["Beta".to_string()]);
}

#[test]
fn test_query_pipeline() {
    let words = observable_list!["apple", "avocado", "banana", "blueberry", "cherry"];

    let groups = words.group_by(|w| w.chars().next().unwrap_or_default());
    assert_eq!(groups[&'a'], vec!["apple", "avocado"]);
    assert_eq!(groups[&'b'].len(), 2);

    let first_per_letter = words.distinct_by(|w| w.len());
    assert_eq!(first_per_letter, vec!["apple", "avocado", "banana", "blueberry"]);

    let lengths = words.associate(|w| (*w, w.len()));
    assert_eq!(lengths[&"cherry"], 6);

    let chunks = words.chunked(2).unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2], vec!["cherry"]);

    let total = words.reduce(0, |acc, w| acc + w.len());
    assert_eq!(total, 5 + 7 + 6 + 9 + 6);
}

#[test]
fn test_transforms_never_touch_the_source() {
    let numbers = observable_list![1, 2, 3, 4, 5, 6];
    let mut events = numbers.subscribe().unwrap();

    let evens = numbers.filter(|n| n % 2 == 0);
    let squares = numbers.map(|n| n * n);
    let (small, large) = numbers.partition(|n| *n <= 3);

    assert_eq!(evens.to_vec(), vec![2, 4, 6]);
    assert_eq!(squares.to_vec(), vec![1, 4, 9, 16, 25, 36]);
    assert_eq!(small, vec![1, 2, 3]);
    assert_eq!(large, vec![4, 5, 6]);

    evens.push(8).unwrap();
    assert_eq!(numbers.len(), 6);
    assert!(events.drain_pending().is_empty());
}

#[test]
fn test_map_update_and_entries() {
    let stock = observable_map! { "apples" => 3u32, "pears" => 0 };
    let mut events = stock.subscribe().unwrap();

    assert_eq!(stock.update(&"apples", |n| n + 2).unwrap(), Some(5));
    assert_eq!(stock.retain(|_, n| *n > 0).unwrap(), 1);

    let mut entries = stock.entries();
    entries.sort();
    assert_eq!(entries, vec![("apples", 5)]);

    let events = events.drain_pending();
    assert_eq!(events[0].previous(), &[("apples", 3)]);
    assert_eq!(events[1].keys(), vec!["pears"]);
}
