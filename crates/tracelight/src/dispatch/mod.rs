//! Capability detection and adaptive dispatch.

pub mod backend;
pub mod dispatcher;
pub mod fallback;

pub use backend::{BackendAvailability, BackendSlot, NativeBackend, NoBackend};
pub use dispatcher::AdaptiveDispatcher;
pub use fallback::{FallbackProvider, Operation};
