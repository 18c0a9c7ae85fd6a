//! The fallback operation catalog.
//!
//! Every operation the dispatcher understands has a simulated response here,
//! served when no native backend is present or when the native call fails.
//! Each call sleeps for a random interval inside the configured latency
//! window first. The only error this module raises is
//! [`Error::UnknownOperation`].

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::recognition::{RecognitionSupervisor, SessionState};
use crate::trace::{ids, TraceRegistry, Trail};

const RECORDING_STARTED: &str = "Recording started";
const RECORDING_STOPPED: &str = "Recording stopped";

/// An operation in the fallback catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Bring the application backend up.
    Initialize,
    /// Check connectivity to the coaching model provider.
    TestConnection,
    /// Enumerate audio devices.
    AudioDevices,
    /// Start capturing and transcribing speech.
    StartRecording,
    /// Stop capturing.
    StopRecording,
    /// Report the capture state.
    AudioStatus,
    /// Poll input levels.
    AudioLevels,
    /// Report pipeline performance.
    PerformanceMetrics,
    /// Produce a coaching suggestion for a transcript.
    CoachingPrompt,
}

impl Operation {
    /// Every catalog entry.
    pub const ALL: [Self; 9] = [
        Self::Initialize,
        Self::TestConnection,
        Self::AudioDevices,
        Self::StartRecording,
        Self::StopRecording,
        Self::AudioStatus,
        Self::AudioLevels,
        Self::PerformanceMetrics,
        Self::CoachingPrompt,
    ];

    /// The wire name callers dispatch by.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize_voicecoach",
            Self::TestConnection => "test_openrouter_connection",
            Self::AudioDevices => "get_audio_devices",
            Self::StartRecording => "start_recording",
            Self::StopRecording => "stop_recording",
            Self::AudioStatus => "get_audio_status",
            Self::AudioLevels => "get_audio_levels",
            Self::PerformanceMetrics => "get_performance_metrics",
            Self::CoachingPrompt => "generate_coaching_prompt",
        }
    }

    /// One-line description for listings.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Initialize => "initialize the backend",
            Self::TestConnection => "check coaching model connectivity",
            Self::AudioDevices => "list audio devices",
            Self::StartRecording => "start a recognition session",
            Self::StopRecording => "stop the recognition session",
            Self::AudioStatus => "report capture state",
            Self::AudioLevels => "poll input levels",
            Self::PerformanceMetrics => "report pipeline performance",
            Self::CoachingPrompt => "suggest a next step for a transcript",
        }
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| Error::unknown_operation(s))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Serves the fallback catalog.
#[derive(Debug, Clone)]
pub struct FallbackProvider {
    trail: Trail,
    latency: DispatchConfig,
    supervisor: Option<RecognitionSupervisor>,
}

impl FallbackProvider {
    /// Create a provider without a recognition supervisor.
    #[must_use]
    pub fn new(registry: &TraceRegistry, latency: DispatchConfig) -> Self {
        Self {
            trail: registry.trail("FallbackProvider"),
            latency,
            supervisor: None,
        }
    }

    /// Attach the supervisor `start_recording` and friends drive.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: RecognitionSupervisor) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// The attached supervisor, if any.
    #[must_use]
    pub fn supervisor(&self) -> Option<&RecognitionSupervisor> {
        self.supervisor.as_ref()
    }

    /// Serve `operation` from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if `operation` is not in the
    /// catalog.
    pub async fn invoke(&self, operation: &str, args: &Value) -> Result<Value> {
        self.trail
            .light(ids::FALLBACK_CALL, Some(json!({ "operation": operation })));

        tokio::time::sleep(self.simulated_latency()).await;

        let op = match operation.parse::<Operation>() {
            Ok(op) => op,
            Err(err) => {
                self.trail.fail(ids::FALLBACK_UNKNOWN_OPERATION, &err);
                return Err(err);
            }
        };

        let response = match op {
            Operation::Initialize => json!("VoiceCoach initialized (fallback)"),
            Operation::TestConnection => json!("Connection test succeeded (fallback)"),
            Operation::AudioDevices => audio_devices(),
            Operation::StartRecording => self.start_recording(),
            Operation::StopRecording => self.stop_recording(),
            Operation::AudioStatus => self.audio_status(),
            Operation::AudioLevels => audio_levels(),
            Operation::PerformanceMetrics => performance_metrics(),
            Operation::CoachingPrompt => {
                let transcript = args
                    .get("transcript")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let prompt = coaching_prompt(transcript);
                self.trail.light(
                    ids::COACHING_PROMPT_GENERATED,
                    Some(json!({ "confidence_score": prompt["confidence_score"] })),
                );
                prompt
            }
        };

        self.trail
            .light(ids::FALLBACK_RESPONSE, Some(json!({ "operation": operation })));
        Ok(response)
    }

    fn simulated_latency(&self) -> Duration {
        let DispatchConfig {
            min_latency_ms,
            max_latency_ms,
        } = self.latency;
        if max_latency_ms <= min_latency_ms {
            return Duration::from_millis(min_latency_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min_latency_ms..=max_latency_ms))
    }

    fn start_recording(&self) -> Value {
        let Some(supervisor) = &self.supervisor else {
            return json!(RECORDING_STARTED);
        };
        match supervisor.start() {
            Ok(()) => json!({
                "status": "recording",
                "state": supervisor.state(),
            }),
            Err(err) => {
                warn!(error = %err, "speech recognition unavailable, reporting simulated start");
                json!(RECORDING_STARTED)
            }
        }
    }

    fn stop_recording(&self) -> Value {
        if let Some(supervisor) = &self.supervisor {
            supervisor.stop();
        }
        json!(RECORDING_STOPPED)
    }

    fn audio_status(&self) -> Value {
        let state = self
            .supervisor
            .as_ref()
            .map_or(SessionState::Idle, RecognitionSupervisor::state);
        debug!(%state, "audio status");
        json!({
            "is_recording": state != SessionState::Idle,
            "state": state,
            "recognition_available": self.supervisor.is_some(),
        })
    }
}

fn audio_devices() -> Value {
    json!([
        {
            "name": "Default Microphone",
            "is_input": true,
            "is_default": true,
            "sample_rate": 48_000,
            "channels": 1,
        },
        {
            "name": "System Audio (Loopback)",
            "is_input": true,
            "is_default": false,
            "sample_rate": 48_000,
            "channels": 2,
        },
        {
            "name": "Default Speakers",
            "is_input": false,
            "is_default": true,
            "sample_rate": 48_000,
            "channels": 2,
        },
    ])
}

fn audio_levels() -> Value {
    let mut rng = rand::thread_rng();
    json!({
        "user": rng.gen_range(0.0..0.8),
        "prospect": rng.gen_range(0.0..0.6),
        "timestamp": Utc::now().timestamp_millis(),
    })
}

fn performance_metrics() -> Value {
    let mut rng = rand::thread_rng();
    json!({
        "latency_ms": rng.gen_range(80..250),
        "cpu_usage": rng.gen_range(5.0..35.0),
        "memory_usage_mb": rng.gen_range(120..260),
        "transcription_accuracy": rng.gen_range(0.85..0.98),
    })
}

/// Keyword groups and the suggestion each one triggers, checked in order.
const SUGGESTIONS: &[(&[&str], &str, [&str; 2])] = &[
    (
        &["price", "cost", "expensive", "budget"],
        "Acknowledge the budget concern, then anchor on the value delivered",
        ["Quantify the return on investment", "Offer a phased rollout"],
    ),
    (
        &["competitor", "alternative", "already using"],
        "Ask what they like about their current option before differentiating",
        ["Highlight one clear differentiator", "Share a relevant customer story"],
    ),
    (
        &["timeline", "when", "deadline", "soon"],
        "Confirm their timeline and map the next steps to it",
        ["Propose a concrete follow-up date", "Identify who else must sign off"],
    ),
];

const DEFAULT_SUGGESTION: (&str, [&str; 2]) = (
    "Focus on asking open-ended questions to understand the prospect's needs",
    ["Listen for buying signals", "Address any objections directly"],
);

/// A canned coaching prompt whose suggestion follows transcript keywords and
/// whose confidence grows with transcript length.
fn coaching_prompt(transcript: &str) -> Value {
    let lowered = transcript.to_lowercase();
    let (suggestion, actions) = SUGGESTIONS
        .iter()
        .find(|(keywords, _, _)| keywords.iter().any(|k| lowered.contains(*k)))
        .map_or(DEFAULT_SUGGESTION, |(_, suggestion, actions)| {
            (*suggestion, *actions)
        });

    let words = u32::try_from(transcript.split_whitespace().count()).unwrap_or(u32::MAX);
    let confidence = (0.5 + f64::from(words) * 0.02).min(0.95);

    json!({
        "primary_suggestion": suggestion,
        "confidence_score": confidence,
        "next_best_actions": actions,
    })
}
