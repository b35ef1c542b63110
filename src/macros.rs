// ============================================================================
// spark-collections - Ergonomic Macros
// ============================================================================

/// Create an [`ObservableList`](crate::ObservableList) from a list of items.
///
/// # Usage
///
/// ```rust
/// use spark_collections::observable_list;
///
/// let queue = observable_list![1, 2, 3];
/// assert_eq!(queue.to_vec(), vec![1, 2, 3]);
///
/// let empty: spark_collections::ObservableList<u8> = observable_list![];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! observable_list {
    () => {
        $crate::ObservableList::new()
    };
    ($($item:expr),+ $(,)?) => {
        $crate::ObservableList::from_vec(vec![$($item),+])
    };
}

/// Create an [`ObservableSet`](crate::ObservableSet) from a list of items.
/// Duplicates collapse the way `HashSet` collapses them.
///
/// # Usage
///
/// ```rust
/// use spark_collections::observable_set;
///
/// let tags = observable_set!["rust", "async", "rust"];
/// assert_eq!(tags.len(), 2);
/// ```
#[macro_export]
macro_rules! observable_set {
    () => {
        $crate::ObservableSet::new()
    };
    ($($item:expr),+ $(,)?) => {
        $crate::ObservableSet::from_iter([$($item),+])
    };
}

/// Create an [`ObservableMap`](crate::ObservableMap) from `key => value`
/// pairs.
///
/// # Usage
///
/// ```rust
/// use spark_collections::observable_map;
///
/// let ports = observable_map! {
///     "http" => 80,
///     "https" => 443,
/// };
/// assert_eq!(ports.get(&"https"), Some(443));
/// ```
#[macro_export]
macro_rules! observable_map {
    () => {
        $crate::ObservableMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::ObservableMap::from_iter([$(($key, $value)),+])
    };
}

// =============================================================================
// TESTS
// =============================================================================
