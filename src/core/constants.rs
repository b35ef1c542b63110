// ============================================================================
// spark-collections - Constants
// Defaults shared by options and the event pipeline
// ============================================================================

/// Name used in log records when a collection was created without one.
pub const DEFAULT_NAME: &str = "observable";

/// Sequence number of the first committed event. Zero means "nothing
/// committed yet", which is also the watermark of the earliest subscriber.
pub const FIRST_SEQUENCE: u64 = 1;

/// Channel capacity suggested for bounded subscribers.
pub const DEFAULT_BOUNDED_CAPACITY: usize = 256;
