//! The platform speech recognition seam.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::RecognitionConfig;
use crate::error::{RecognitionError, RecognitionErrorKind};

/// Options passed to the platform when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// BCP 47 language tag.
    pub language: String,
    /// Keep listening across pauses instead of ending after one utterance.
    pub continuous: bool,
    /// Report non-final hypotheses as they form.
    pub interim_results: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&RecognitionConfig::default())
    }
}

impl From<&RecognitionConfig> for SessionOptions {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

/// One piece of a platform result callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Recognized text.
    pub text: String,
    /// Whether the platform considers this segment settled.
    pub is_final: bool,
}

impl Segment {
    /// A settled segment.
    #[must_use]
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// A revisable segment.
    #[must_use]
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Signals a platform session sends back to its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The session is capturing audio.
    Started,
    /// A result callback.
    Results(Vec<Segment>),
    /// The session failed.
    Error(RecognitionError),
    /// The session ended, asked for or not.
    Ended,
}

/// Where a platform session delivers its events.
pub type PlatformEventSender = mpsc::UnboundedSender<PlatformEvent>;

/// A platform able to open recognition sessions.
pub trait RecognitionEngine: Send + Sync {
    /// Open a session that reports through `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot open a session.
    fn start(
        &self,
        options: &SessionOptions,
        events: PlatformEventSender,
    ) -> Result<Box<dyn RecognitionHandle>, RecognitionError>;
}

/// Control over one open platform session.
pub trait RecognitionHandle: Send {
    /// End the session. The platform may still deliver an `Ended` event.
    fn stop(&mut self);
}

/// An engine for hosts without speech recognition; every start fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl RecognitionEngine for UnavailableEngine {
    fn start(
        &self,
        _options: &SessionOptions,
        _events: PlatformEventSender,
    ) -> Result<Box<dyn RecognitionHandle>, RecognitionError> {
        Err(RecognitionError::new(
            RecognitionErrorKind::Unavailable,
            "speech recognition is not available on this host",
        ))
    }
}
