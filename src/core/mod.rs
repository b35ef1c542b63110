// ============================================================================
// spark-collections - Core Module
// Errors, strategy types, equality helpers and configuration
// ============================================================================

pub mod constants;
pub mod equality;
pub mod error;
pub(crate) mod lock;
pub mod options;
pub mod types;

// Re-export commonly used items
pub use error::{CollectionError, Result};
pub use options::{Backpressure, ObservableOptions};
pub use types::{default_equals, equals_fn, EqualsFn, ListenerFn};
