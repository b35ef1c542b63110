// ============================================================================
// spark-collections - Events Module
// Change event model and the subscription registry
// ============================================================================

pub mod change;
pub mod registry;

pub use change::{ChangeEvent, ChangeKind};
pub use registry::{BlockingIter, SubscriberId, SubscriberRegistry, Subscription};
