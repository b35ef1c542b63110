// ============================================================================
// spark-collections - Gate
// Mutual exclusion, commit sequencing and ordered delivery shared by every
// observable collection
// ============================================================================
//
// A mutation runs in three steps:
//
// 1. Under the gate: apply the change to storage and stamp the event with
//    the next sequence number.
// 2. Still under the gate: hand the event to delivery, which feeds channel
//    subscribers immediately and queues it for callback listeners.
// 3. With the gate released: if this caller became the drainer, it runs the
//    callbacks for its own event (see `delivery.rs`).
//
// Operations that take user closures (merge resolvers, `retain` predicates,
// `update` transforms) use `mutate_with`: they copy what they need under the
// gate, run the closure with the gate released and commit only if nothing
// else committed in between, retrying otherwise. A closure may therefore
// read the collection, and a panic inside it leaves storage untouched. A
// closure that writes to the same collection gets `Reentrant` instead of
// looping forever.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::collections::delivery::{Delivery, Dispatch};
use crate::core::error::{CollectionError, Result};
use crate::core::lock::lock;
use crate::core::options::ObservableOptions;
use crate::events::{ChangeEvent, SubscriberId, Subscription};

/// Outcome of a mutation closure: the caller's return value plus the event
/// to publish, if anything changed.
pub(crate) type Committed<R, T> = (R, Option<ChangeEvent<T>>);

static NEXT_GATE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Gates this thread is currently running a user closure for, with the
    /// operation that called it.
    static PLANNING: RefCell<Vec<(u64, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a gate as busy planning on this thread until dropped, including
/// when the closure panics.
struct PlanningScope {
    gate: u64,
}

impl PlanningScope {
    fn enter(gate: u64, operation: &'static str) -> Self {
        PLANNING.with(|planning| planning.borrow_mut().push((gate, operation)));
        Self { gate }
    }
}

impl Drop for PlanningScope {
    fn drop(&mut self) {
        PLANNING.with(|planning| {
            let mut planning = planning.borrow_mut();
            if let Some(pos) = planning.iter().rposition(|(gate, _)| *gate == self.gate) {
                planning.remove(pos);
            }
        });
    }
}

fn planning_operation(gate: u64) -> Option<&'static str> {
    PLANNING.with(|planning| {
        planning
            .borrow()
            .iter()
            .rev()
            .find(|(id, _)| *id == gate)
            .map(|(_, operation)| *operation)
    })
}

struct GateState<S> {
    storage: S,
    disposed: bool,
    /// Sequence of the last committed event.
    sequence: u64,
}

pub(crate) struct Gate<S, T> {
    id: u64,
    options: ObservableOptions,
    state: Mutex<GateState<S>>,
    delivery: Arc<Delivery<T>>,
}

impl<S, T> Gate<S, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Callers validate `options` first.
    pub(crate) fn new(storage: S, options: &ObservableOptions) -> Self {
        Self {
            id: NEXT_GATE_ID.fetch_add(1, Ordering::Relaxed),
            options: options.clone(),
            state: Mutex::new(GateState {
                storage,
                disposed: false,
                sequence: 0,
            }),
            delivery: Delivery::new(options),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.options.name
    }

    pub(crate) fn options(&self) -> &ObservableOptions {
        &self.options
    }

    /// Run a read-only closure against storage.
    ///
    /// The closure runs under the gate; keep it to copying data out. User
    /// predicates belong on the snapshot, not in here.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = lock(&self.state);
        f(&state.storage)
    }

    fn guard_reentry(&self) -> Result<()> {
        match planning_operation(self.id) {
            Some(operation) => Err(CollectionError::Reentrant {
                collection: self.name(),
                operation,
            }),
            None => Ok(()),
        }
    }

    /// Apply a mutation atomically and publish its event.
    ///
    /// `f` runs under the gate and must not call user code.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut S) -> Result<Committed<R, T>>) -> Result<R> {
        self.guard_reentry()?;
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(CollectionError::Disposed);
        }
        let committed = f(&mut state.storage)?;
        self.commit(state, committed)
    }

    /// Apply a mutation that depends on user code.
    ///
    /// `capture` copies what `plan` needs under the gate. `plan` then runs
    /// with the gate released. `apply` commits the plan under the gate if no
    /// other change committed since the capture; otherwise the three steps
    /// start over, so `plan` may run more than once.
    pub(crate) fn mutate_with<C, P, R>(
        &self,
        operation: &'static str,
        capture: impl Fn(&S) -> C,
        mut plan: impl FnMut(C) -> P,
        apply: impl FnOnce(&mut S, P) -> Result<Committed<R, T>>,
    ) -> Result<R> {
        self.guard_reentry()?;
        let (mut state, planned) = loop {
            let (seen, captured) = {
                let state = lock(&self.state);
                if state.disposed {
                    return Err(CollectionError::Disposed);
                }
                (state.sequence, capture(&state.storage))
            };

            let planned = {
                let _scope = PlanningScope::enter(self.id, operation);
                plan(captured)
            };

            let state = lock(&self.state);
            if state.disposed {
                return Err(CollectionError::Disposed);
            }
            if state.sequence == seen {
                break (state, planned);
            }
            trace!(
                collection = self.name(),
                operation,
                seen,
                sequence = state.sequence,
                "concurrent change, planning again"
            );
        };
        let committed = apply(&mut state.storage, planned)?;
        self.commit(state, committed)
    }

    fn commit<R>(&self, mut state: MutexGuard<'_, GateState<S>>, committed: Committed<R, T>) -> Result<R> {
        let (result, event) = committed;
        let Some(event) = event else {
            return Ok(result);
        };
        state.sequence += 1;
        let event = event.sequenced(state.sequence);
        trace!(
            collection = self.name(),
            kind = ?event.kind(),
            sequence = event.sequence(),
            items = event.len(),
            "change committed"
        );
        let must_drain = self.delivery.enqueue(Dispatch::Event(event));
        drop(state);
        if must_drain {
            self.delivery.drain_inline();
        }
        Ok(result)
    }

    /// Sequence number of the last committed event (0 before the first).
    pub(crate) fn sequence(&self) -> u64 {
        lock(&self.state).sequence
    }

    pub(crate) fn subscribe(&self) -> Result<Subscription<T>> {
        let state = lock(&self.state);
        if state.disposed {
            return Err(CollectionError::Disposed);
        }
        self.delivery.registry().subscribe(state.sequence)
    }

    pub(crate) fn listen<F>(&self, callback: F) -> Result<SubscriberId>
    where
        F: Fn(&ChangeEvent<T>) + Send + Sync + 'static,
    {
        let state = lock(&self.state);
        if state.disposed {
            return Err(CollectionError::Disposed);
        }
        self.delivery.registry().listen(state.sequence, callback)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.delivery.registry().unsubscribe(id)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.delivery.registry().len()
    }

    pub(crate) fn subscriber_failures(&self) -> u64 {
        self.delivery.registry().failures()
    }

    pub(crate) fn dropped_events(&self) -> u64 {
        self.delivery.dropped()
    }

    pub(crate) fn flush(&self) {
        self.delivery.flush();
    }

    /// Close the collection. Events committed before the call are still
    /// delivered; afterwards the registry closes and every stream ends.
    ///
    /// Returns false if the collection was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        let must_drain = {
            let mut state = lock(&self.state);
            if state.disposed {
                return false;
            }
            state.disposed = true;
            debug!(collection = self.name(), sequence = state.sequence, "disposing collection");
            self.delivery.enqueue(Dispatch::Close)
        };
        if must_drain {
            self.delivery.drain_inline();
        }
        true
    }

    pub(crate) fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }
}

impl<S, T> Drop for Gate<S, T> {
    fn drop(&mut self) {
        self.delivery.shutdown();
    }
}

impl<S: fmt::Debug, T> fmt::Debug for Gate<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Gate")
            .field("name", &self.options.name)
            .field("storage", &state.storage)
            .field("sequence", &state.sequence)
            .field("disposed", &state.disposed)
            .finish()
    }
}

// =============================================================================
// DELEGATION
// =============================================================================

/// Generate the subscription and lifecycle methods every collection shares.
macro_rules! observable_api {
    ($item:ty) => {
        /// Name from the options, used in log records.
        pub fn name(&self) -> &'static str {
            self.gate.name()
        }

        /// Options the collection was built with. Derived collections and
        /// clones inherit them.
        pub fn options(&self) -> &$crate::core::ObservableOptions {
            self.gate.options()
        }

        /// Subscribe a channel listener.
        ///
        /// Only events committed after this call are delivered; nothing is
        /// replayed. Fails with `Disposed` after [`dispose`](Self::dispose).
        pub fn subscribe(&self) -> $crate::core::Result<$crate::events::Subscription<$item>> {
            self.gate.subscribe()
        }

        /// Subscribe a callback.
        ///
        /// Callbacks run in commit order, never while the collection is
        /// locked. A mutator runs them for its own change only; changes
        /// committed by other threads meanwhile are delivered by the
        /// collection's delivery worker. Use [`flush`](Self::flush) to wait
        /// for them. A panic inside a callback is caught, logged and counted
        /// in [`subscriber_failures`](Self::subscriber_failures).
        pub fn listen<F>(&self, callback: F) -> $crate::core::Result<$crate::events::SubscriberId>
        where
            F: Fn(&$crate::events::ChangeEvent<$item>) + Send + Sync + 'static,
        {
            self.gate.listen(callback)
        }

        /// Remove a subscriber. Events committed after this returns are not
        /// delivered to it. Returns false if it was not registered.
        pub fn unsubscribe(&self, id: $crate::events::SubscriberId) -> bool {
            self.gate.unsubscribe(id)
        }

        /// Number of registered subscribers.
        pub fn subscriber_count(&self) -> usize {
            self.gate.subscriber_count()
        }

        /// Number of subscriber callbacks that panicked so far.
        pub fn subscriber_failures(&self) -> u64 {
            self.gate.subscriber_failures()
        }

        /// Number of events callback listeners missed because the delivery
        /// queue was full. Always 0 with `Backpressure::Unbounded`.
        pub fn dropped_events(&self) -> u64 {
            self.gate.dropped_events()
        }

        /// Block until every callback for changes committed so far has run.
        ///
        /// Returns immediately when called from inside a listener.
        pub fn flush(&self) {
            self.gate.flush()
        }

        /// Sequence of the last committed change (0 if nothing changed yet).
        pub fn sequence(&self) -> u64 {
            self.gate.sequence()
        }

        /// Permanently close the event channel.
        ///
        /// Pending events are still delivered, then every subscription ends.
        /// Afterwards mutations and subscriptions fail with `Disposed`;
        /// reads keep working. Returns false if already disposed.
        pub fn dispose(&self) -> bool {
            self.gate.dispose()
        }

        /// True once [`dispose`](Self::dispose) has been called.
        pub fn is_disposed(&self) -> bool {
            self.gate.is_disposed()
        }
    };
}

pub(crate) use observable_api;

// =============================================================================
// TESTS
// =============================================================================
