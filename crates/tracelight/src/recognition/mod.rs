//! Continuous speech recognition.
//!
//! [`RecognitionEngine`] is the platform seam; [`RecognitionSupervisor`]
//! keeps one session alive across unexpected ends.

pub mod engine;
pub mod supervisor;

pub use engine::{
    PlatformEvent, PlatformEventSender, RecognitionEngine, RecognitionHandle, Segment,
    SessionOptions, UnavailableEngine,
};
pub use supervisor::{
    RecognitionSupervisor, SessionState, SupervisorEvent, TranscriptEvent, MAX_RESTART_ATTEMPTS,
};
