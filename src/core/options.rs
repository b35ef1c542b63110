// ============================================================================
// spark-collections - Options
// Construction-time configuration for observable collections
// ============================================================================

use crate::core::constants::{DEFAULT_BOUNDED_CAPACITY, DEFAULT_NAME};
use crate::core::error::{CollectionError, Result};

// =============================================================================
// BACKPRESSURE
// =============================================================================

/// What happens when subscribers fall behind.
///
/// Each channel subscriber has its own queue. Callback listeners share the
/// collection's delivery queue, which holds changes waiting for a busy
/// listener; the same capacity bounds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backpressure {
    /// Every subscriber gets an unbounded queue. Nothing is dropped and
    /// mutators never wait on subscribers.
    #[default]
    Unbounded,

    /// Every channel subscriber gets a queue of `capacity` events. When it
    /// is full, the incoming event is dropped for that subscriber only and
    /// counted in [`Subscription::dropped_events`](crate::events::Subscription::dropped_events).
    /// When the delivery queue holds `capacity` events, further events
    /// skip callback listeners and are counted in the collection's
    /// `dropped_events`.
    DropNewest { capacity: usize },
}

impl Backpressure {
    /// `DropNewest` with the default queue capacity.
    pub const fn bounded() -> Self {
        Self::DropNewest {
            capacity: DEFAULT_BOUNDED_CAPACITY,
        }
    }
}

// =============================================================================
// OBSERVABLE OPTIONS
// =============================================================================

/// Options for creating an observable collection.
///
/// # Example
///
/// ```
/// use spark_collections::{Backpressure, ObservableOptions, ObservableSet};
///
/// let options = ObservableOptions::named("tags")
///     .with_backpressure(Backpressure::DropNewest { capacity: 64 });
/// let tags: ObservableSet<String> = ObservableSet::with_options(options).unwrap();
/// assert_eq!(tags.name(), "tags");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableOptions {
    /// Label attached to every log record emitted for the collection.
    pub name: &'static str,
    /// Queueing policy for channel subscribers.
    pub backpressure: Backpressure,
}

impl Default for ObservableOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME,
            backpressure: Backpressure::Unbounded,
        }
    }
}

impl ObservableOptions {
    /// Default options with a custom name.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Replace the backpressure policy.
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    /// Check the options for values the event pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if let Backpressure::DropNewest { capacity: 0 } = self.backpressure {
            return Err(CollectionError::invalid(
                "capacity",
                "bounded subscriber queues need a capacity greater than zero",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
