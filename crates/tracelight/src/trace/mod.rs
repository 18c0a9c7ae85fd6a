//! Checkpoint tracing.
//!
//! Components record numbered checkpoints on a [`Trail`]. Every trail reports
//! to a [`TraceRegistry`], which keeps a merged stream of all events and a
//! separate failure stream, and answers diagnostic queries over them.

pub mod checkpoint;
mod event;
pub mod query;
mod registry;
mod trail;

pub use checkpoint::{checkpoint_name, ids, Category};
pub use event::{TraceError, TraceEvent};
pub use query::{
    AudioModeStats, CoachingStats, ComponentStatistics, DocumentProcessingStats, EventFilter,
    GlobalStatistics, NativeCallStats, Rollup, SearchStats, TraceStatistics,
};
pub use registry::TraceRegistry;
pub use trail::Trail;
