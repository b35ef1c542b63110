// ============================================================================
// spark-collections - Observable Collections
// Lists, maps and sets that publish one change event per mutation
// ============================================================================
//
// Every collection owns a gate (see gate.rs) that serializes mutations and
// delivers their events in commit order. Three things hold for all of them:
//
// 1. A mutation that changes nothing emits nothing.
// 2. Bulk operations commit atomically and emit a single event.
// 3. Transforms and queries work on snapshots and never emit.
// ============================================================================

mod delivery;
mod gate;
mod list;
mod map;
pub mod query;
mod set;

pub use list::ObservableList;
pub use map::ObservableMap;
pub use query::CollectionQuery;
pub use set::ObservableSet;
