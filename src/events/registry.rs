// ============================================================================
// spark-collections - Subscription Registry
// Multicast fan-out of change events to channel and callback subscribers
// ============================================================================
//
// Every subscriber owns its own delivery destination:
//
// - Channel subscribers get a `futures::channel::mpsc` queue whose receiving
//   end is handed out as a `Subscription`. Sends never block: unbounded
//   queues always accept, bounded queues drop the newest event when full.
// - Callback subscribers are invoked after the registry lock is released,
//   inside `catch_unwind`, so a panicking callback is logged and counted
//   but never reaches the mutator or the other subscribers.
//
// Each entry records the commit sequence at the time it subscribed and only
// receives events with a greater sequence. That keeps late subscribers from
// seeing events that were committed before they arrived but delivered after.
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::channel::mpsc;
use futures::stream::{FusedStream, Stream, StreamExt};
use tracing::{debug, warn};

use crate::core::error::{CollectionError, Result};
use crate::core::lock::lock;
use crate::core::options::Backpressure;
use crate::core::types::ListenerFn;
use crate::events::change::ChangeEvent;

// =============================================================================
// SUBSCRIBER ID
// =============================================================================

/// Opaque handle identifying one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// The raw numeric id (unique per registry).
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// REGISTRY ENTRIES
// =============================================================================

enum Sink<T> {
    Unbounded(mpsc::UnboundedSender<ChangeEvent<T>>),
    Bounded {
        sender: mpsc::Sender<ChangeEvent<T>>,
        dropped: Arc<AtomicU64>,
    },
    Callback(ListenerFn<ChangeEvent<T>>),
}

struct Entry<T> {
    id: SubscriberId,
    /// Last sequence committed before this subscriber registered.
    since: u64,
    sink: Sink<T>,
}

struct RegistryInner<T> {
    entries: Vec<Entry<T>>,
    closed: bool,
}

// =============================================================================
// SUBSCRIBER REGISTRY
// =============================================================================

/// Registry of live subscribers for one collection.
///
/// Collections own one of these and feed it events in commit order; it can
/// also be used on its own as a plain multicast hub.
pub struct SubscriberRegistry<T> {
    name: &'static str,
    backpressure: Backpressure,
    inner: Mutex<RegistryInner<T>>,
    next_id: AtomicU64,
    failures: AtomicU64,
}

impl<T> SubscriberRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new(name: &'static str, backpressure: Backpressure) -> Self {
        Self {
            name,
            backpressure,
            inner: Mutex::new(RegistryInner {
                entries: Vec::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
            failures: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn register(&self, since: u64, sink: Sink<T>) -> Result<SubscriberId> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(CollectionError::Disposed);
        }
        let id = self.next_id();
        inner.entries.push(Entry { id, since, sink });
        debug!(collection = self.name, subscriber = %id, since, "subscriber registered");
        Ok(id)
    }

    /// Register a channel subscriber that receives events with a sequence
    /// greater than `since`.
    pub fn subscribe(&self, since: u64) -> Result<Subscription<T>> {
        let dropped = Arc::new(AtomicU64::new(0));
        let (sink, receiver) = match self.backpressure {
            Backpressure::Unbounded => {
                let (tx, rx) = mpsc::unbounded();
                (Sink::Unbounded(tx), EventReceiver::Unbounded(rx))
            }
            Backpressure::DropNewest { capacity } => {
                // mpsc::channel(n) holds n + 1 messages for a single sender.
                let (tx, rx) = mpsc::channel(capacity.saturating_sub(1));
                (
                    Sink::Bounded {
                        sender: tx,
                        dropped: dropped.clone(),
                    },
                    EventReceiver::Bounded(rx),
                )
            }
        };
        let id = self.register(since, sink)?;
        Ok(Subscription {
            id,
            receiver,
            dropped,
        })
    }

    /// Register a callback subscriber.
    pub fn listen<F>(&self, since: u64, callback: F) -> Result<SubscriberId>
    where
        F: Fn(&ChangeEvent<T>) + Send + Sync + 'static,
    {
        self.register(since, Sink::Callback(Arc::new(callback)))
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.id != id);
        let removed = inner.entries.len() != before;
        if removed {
            debug!(collection = self.name, subscriber = %id, "subscriber removed");
        }
        removed
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// True if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Number of callback invocations that panicked so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// True if at least one callback listener is registered.
    pub fn has_listeners(&self) -> bool {
        lock(&self.inner)
            .entries
            .iter()
            .any(|entry| matches!(entry.sink, Sink::Callback(_)))
    }

    /// Deliver `event` to every subscriber registered before it was
    /// committed: channels first, then callbacks.
    pub fn broadcast(&self, event: &ChangeEvent<T>) {
        self.publish(event);
        self.notify_listeners(event);
    }

    /// Queue `event` on every channel subscriber. Never blocks and never
    /// runs user code, so collections call it while their gate is held.
    pub fn publish(&self, event: &ChangeEvent<T>) {
        let mut inner = lock(&self.inner);
        let name = self.name;
        inner.entries.retain_mut(|entry| {
            if event.sequence() <= entry.since {
                return true;
            }
            match &mut entry.sink {
                Sink::Unbounded(tx) => {
                    let delivered = tx.unbounded_send(event.clone()).is_ok();
                    if !delivered {
                        debug!(collection = name, subscriber = %entry.id, "pruning closed subscription");
                    }
                    delivered
                }
                Sink::Bounded { sender, dropped } => match sender.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(err) if err.is_full() => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            collection = name,
                            subscriber = %entry.id,
                            sequence = event.sequence(),
                            "subscriber queue full, event dropped"
                        );
                        true
                    }
                    Err(_) => {
                        debug!(collection = name, subscriber = %entry.id, "pruning closed subscription");
                        false
                    }
                },
                Sink::Callback(_) => true,
            }
        });
    }

    /// Invoke every callback listener registered before `event` was
    /// committed. Runs with the registry lock released.
    pub fn notify_listeners(&self, event: &ChangeEvent<T>) {
        let callbacks: Vec<(SubscriberId, ListenerFn<ChangeEvent<T>>)> = lock(&self.inner)
            .entries
            .iter()
            .filter(|entry| event.sequence() > entry.since)
            .filter_map(|entry| match &entry.sink {
                Sink::Callback(callback) => Some((entry.id, callback.clone())),
                _ => None,
            })
            .collect();

        for (id, callback) in callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
            if let Err(payload) = outcome {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let err = CollectionError::SubscriberFailure {
                    subscriber: id,
                    message: panic_message(payload.as_ref()),
                };
                warn!(
                    collection = self.name,
                    sequence = event.sequence(),
                    error = %err,
                    "subscriber callback failed"
                );
            }
        }
    }

    /// Drop every subscriber and refuse new ones. Channel subscriptions end
    /// after yielding the events already queued for them.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        let count = inner.entries.len();
        inner.entries.clear();
        debug!(collection = self.name, subscribers = count, "registry closed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "callback panicked".to_string()
    }
}

impl<T> fmt::Debug for SubscriberRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("SubscriberRegistry")
            .field("name", &self.name)
            .field("subscribers", &inner.entries.len())
            .field("closed", &inner.closed)
            .field("failures", &self.failures.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// SUBSCRIPTION (receiving end)
// =============================================================================

enum EventReceiver<T> {
    Unbounded(mpsc::UnboundedReceiver<ChangeEvent<T>>),
    Bounded(mpsc::Receiver<ChangeEvent<T>>),
}

/// The receiving end of a channel subscriber.
///
/// A `Subscription` is a [`Stream`] of change events. It also offers
/// non-blocking polling ([`try_next_event`](Self::try_next_event)) and a
/// blocking iterator for thread-based consumers. The stream ends once the
/// collection is disposed or dropped. Dropping the subscription unsubscribes
/// it lazily on the next delivery.
pub struct Subscription<T> {
    id: SubscriberId,
    receiver: EventReceiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> Subscription<T> {
    /// The handle to pass to `unsubscribe`.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Events dropped because this subscriber's bounded queue was full.
    /// Always zero under [`Backpressure::Unbounded`].
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Take the next queued event without waiting.
    ///
    /// Returns `None` both when nothing is queued and when the stream has
    /// ended; use [`is_terminated`](FusedStream::is_terminated) to tell them
    /// apart.
    pub fn try_next_event(&mut self) -> Option<ChangeEvent<T>> {
        match &mut self.receiver {
            EventReceiver::Unbounded(rx) => rx.try_recv().ok(),
            EventReceiver::Bounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Take every event queued right now.
    pub fn drain_pending(&mut self) -> Vec<ChangeEvent<T>> {
        std::iter::from_fn(|| self.try_next_event()).collect()
    }

    /// Block the current thread until the next event arrives or the stream
    /// ends.
    pub fn next_blocking(&mut self) -> Option<ChangeEvent<T>> {
        futures::executor::block_on(StreamExt::next(self))
    }

    /// Blocking iterator over incoming events; ends with the stream.
    pub fn iter_blocking(&mut self) -> BlockingIter<'_, T> {
        BlockingIter { subscription: self }
    }

    /// Stop receiving. Already queued events can still be drained.
    pub fn close(&mut self) {
        match &mut self.receiver {
            EventReceiver::Unbounded(rx) => rx.close(),
            EventReceiver::Bounded(rx) => rx.close(),
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = ChangeEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().receiver {
            EventReceiver::Unbounded(rx) => rx.poll_next_unpin(cx),
            EventReceiver::Bounded(rx) => rx.poll_next_unpin(cx),
        }
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        match &self.receiver {
            EventReceiver::Unbounded(rx) => rx.is_terminated(),
            EventReceiver::Bounded(rx) => rx.is_terminated(),
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("dropped", &self.dropped_events())
            .finish()
    }
}

/// Iterator returned by [`Subscription::iter_blocking`].
pub struct BlockingIter<'a, T> {
    subscription: &'a mut Subscription<T>,
}

impl<T> Iterator for BlockingIter<'_, T> {
    type Item = ChangeEvent<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.subscription.next_blocking()
    }
}

// =============================================================================
// TESTS
// =============================================================================
