// ============================================================================
// spark-collections - Delivery
// Ordered callback delivery that never makes a mutator wait for another
// thread's events
// ============================================================================
//
// Channel subscribers are fed at commit time, under the gate, with
// non-blocking sends. Callback listeners go through the queue below:
//
// - Entries are queued under the gate, so the queue is in commit order.
// - At most one thread drains at a time, which keeps callbacks ordered.
// - A mutator that finds nobody draining delivers its own entries inline
//   (its event and anything its callbacks write back). As soon as the front
//   of the queue belongs to another thread, it hands the rest to the
//   collection's delivery worker and returns.
// - The worker is spawned on first hand-off and lives until the collection
//   is dropped.
//
// A slow listener therefore costs a mutator the time of its own event only.
// ============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

use crate::core::lock::lock;
use crate::core::options::{Backpressure, ObservableOptions};
use crate::events::{ChangeEvent, SubscriberRegistry};

pub(crate) enum Dispatch<T> {
    Event(ChangeEvent<T>),
    Close,
}

struct Pending<T> {
    dispatch: Dispatch<T>,
    origin: ThreadId,
}

struct Queue<T> {
    pending: VecDeque<Pending<T>>,
    /// Thread currently delivering, if any.
    drainer: Option<ThreadId>,
    worker: Option<ThreadId>,
    /// Set while the worker owns the queue.
    handoff: bool,
    shutdown: bool,
}

pub(crate) struct Delivery<T> {
    name: &'static str,
    capacity: Option<usize>,
    registry: SubscriberRegistry<T>,
    queue: Mutex<Queue<T>>,
    wake: Condvar,
    idle: Condvar,
    dropped: AtomicU64,
}

impl<T> Delivery<T> {
    /// Stop the worker once it has nothing left to deliver.
    pub(crate) fn shutdown(&self) {
        lock(&self.queue).shutdown = true;
        self.wake.notify_all();
    }

    /// Events skipped for callback listeners because the queue was full.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn wait<'a>(condvar: &Condvar, guard: MutexGuard<'a, Queue<T>>) -> MutexGuard<'a, Queue<T>> {
        condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Delivery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(options: &ObservableOptions) -> Arc<Self> {
        let capacity = match options.backpressure {
            Backpressure::Unbounded => None,
            Backpressure::DropNewest { capacity } => Some(capacity),
        };
        Arc::new(Self {
            name: options.name,
            capacity,
            registry: SubscriberRegistry::new(options.name, options.backpressure),
            queue: Mutex::new(Queue {
                pending: VecDeque::new(),
                drainer: None,
                worker: None,
                handoff: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
            dropped: AtomicU64::new(0),
        })
    }

    pub(crate) fn registry(&self) -> &SubscriberRegistry<T> {
        &self.registry
    }

    /// Publish a committed dispatch. Must be called under the gate so the
    /// queue stays in commit order.
    ///
    /// Returns true if the caller became the drainer and must call
    /// [`drain_inline`](Self::drain_inline) once the gate is released.
    pub(crate) fn enqueue(&self, dispatch: Dispatch<T>) -> bool {
        if let Dispatch::Event(event) = &dispatch {
            self.registry.publish(event);
            if !self.registry.has_listeners() {
                return false;
            }
        }

        let mut queue = lock(&self.queue);
        if let (Dispatch::Event(event), Some(capacity)) = (&dispatch, self.capacity) {
            if queue.pending.len() >= capacity {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    collection = self.name,
                    sequence = event.sequence(),
                    capacity,
                    "listener queue full, event dropped"
                );
                return false;
            }
        }

        let origin = thread::current().id();
        queue.pending.push_back(Pending { dispatch, origin });
        if queue.drainer.is_some() {
            return false;
        }
        queue.drainer = Some(origin);
        true
    }

    /// Deliver the calling thread's own entries, then hand whatever other
    /// threads queued to the worker.
    pub(crate) fn drain_inline(self: &Arc<Self>) {
        let me = thread::current().id();
        loop {
            let next = {
                let mut queue = lock(&self.queue);
                match queue.pending.front().map(|front| front.origin) {
                    None => {
                        queue.drainer = None;
                        self.idle.notify_all();
                        return;
                    }
                    Some(origin) if origin == me => queue.pending.pop_front(),
                    Some(_) => {
                        if self.hand_off(&mut queue) {
                            return;
                        }
                        queue.pending.pop_front()
                    }
                }
            };
            if let Some(next) = next {
                self.dispatch(next.dispatch);
            }
        }
    }

    /// Give the queue to the worker, spawning it on first use. Returns false
    /// if no worker could be started; the caller then keeps draining.
    fn hand_off(self: &Arc<Self>, queue: &mut Queue<T>) -> bool {
        if queue.worker.is_none() {
            let delivery = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name(format!("{}-delivery", self.name))
                .spawn(move || delivery.run_worker());
            match spawned {
                Ok(handle) => {
                    debug!(collection = self.name, "delivery worker started");
                    queue.worker = Some(handle.thread().id());
                }
                Err(err) => {
                    warn!(
                        collection = self.name,
                        error = %err,
                        "delivery worker unavailable, delivering inline"
                    );
                    return false;
                }
            }
        }
        queue.drainer = queue.worker;
        queue.handoff = true;
        self.wake.notify_all();
        true
    }

    fn run_worker(self: Arc<Self>) {
        let mut queue = lock(&self.queue);
        loop {
            if queue.handoff {
                match queue.pending.pop_front() {
                    Some(next) => {
                        drop(queue);
                        self.dispatch(next.dispatch);
                        queue = lock(&self.queue);
                    }
                    None => {
                        queue.handoff = false;
                        queue.drainer = None;
                        self.idle.notify_all();
                    }
                }
            } else if queue.shutdown {
                break;
            } else {
                queue = Self::wait(&self.wake, queue);
            }
        }
        debug!(collection = self.name, "delivery worker stopped");
    }

    fn dispatch(&self, dispatch: Dispatch<T>) {
        match dispatch {
            Dispatch::Event(event) => self.registry.notify_listeners(&event),
            Dispatch::Close => self.registry.close(),
        }
    }

    /// Block until every queued callback has run.
    ///
    /// Returns immediately when called from the delivering thread itself,
    /// i.e. from inside a listener.
    pub(crate) fn flush(&self) {
        let me = thread::current().id();
        let mut queue = lock(&self.queue);
        while let Some(drainer) = queue.drainer {
            if drainer == me {
                return;
            }
            queue = Self::wait(&self.idle, queue);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
