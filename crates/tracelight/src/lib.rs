//! `tracelight` - Checkpoint tracing for hybrid native/fallback applications
//!
//! This library records numbered checkpoints into bounded per-component
//! trails, merges them into one registry for on-demand diagnostics, routes
//! operations to a native backend with a simulated fallback catalog behind
//! it, and keeps continuous speech recognition sessions alive across
//! unexpected ends.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod recognition;
pub mod storage;
pub mod trace;

pub use config::Config;
pub use diagnostics::DiagnosticReport;
pub use dispatch::{AdaptiveDispatcher, FallbackProvider, NativeBackend};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use recognition::{RecognitionEngine, RecognitionSupervisor};
pub use storage::DocumentStore;
pub use trace::{TraceEvent, TraceRegistry, Trail};
