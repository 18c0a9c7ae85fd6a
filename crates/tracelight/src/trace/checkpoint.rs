//! Checkpoint id taxonomy.
//!
//! Checkpoint ids are partitioned into fixed, non-overlapping hundred-wide
//! ranges, each owning one category. Ids this crate emits itself are listed
//! in [`ids`] and carry stable names; any other id inside a range is named
//! after its category, and ids outside every range get the generic
//! `LED_<id>` label.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// The category owning a range of checkpoint ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// 100-199
    UserInteraction,
    /// 200-299
    ApiOperation,
    /// 300-399
    StateManagement,
    /// 400-499
    UiOperation,
    /// 500-599
    AudioProcessing,
    /// 600-699
    SystemOperation,
    /// 700-799
    BuildCompile,
    /// 800-899
    ComponentLocal,
    /// 900-999
    Diagnostic,
}

/// Ordered `(start, end, category)` table; ranges never overlap.
const CATEGORY_RANGES: &[(u32, u32, Category)] = &[
    (100, 199, Category::UserInteraction),
    (200, 299, Category::ApiOperation),
    (300, 399, Category::StateManagement),
    (400, 499, Category::UiOperation),
    (500, 599, Category::AudioProcessing),
    (600, 699, Category::SystemOperation),
    (700, 799, Category::BuildCompile),
    (800, 899, Category::ComponentLocal),
    (900, 999, Category::Diagnostic),
];

impl Category {
    /// Every category, in range order.
    pub const ALL: [Category; 9] = [
        Category::UserInteraction,
        Category::ApiOperation,
        Category::StateManagement,
        Category::UiOperation,
        Category::AudioProcessing,
        Category::SystemOperation,
        Category::BuildCompile,
        Category::ComponentLocal,
        Category::Diagnostic,
    ];

    /// Resolve the category owning `id`, if any.
    #[must_use]
    pub fn of(id: u32) -> Option<Self> {
        CATEGORY_RANGES
            .iter()
            .find(|(start, end, _)| (*start..=*end).contains(&id))
            .map(|(_, _, category)| *category)
    }

    /// The id range owned by this category.
    #[must_use]
    pub fn range(self) -> RangeInclusive<u32> {
        CATEGORY_RANGES
            .iter()
            .find(|(_, _, category)| *category == self)
            .map_or(0..=0, |(start, end, _)| *start..=*end)
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::UserInteraction => "user interaction",
            Self::ApiOperation => "api operation",
            Self::StateManagement => "state management",
            Self::UiOperation => "ui operation",
            Self::AudioProcessing => "audio processing",
            Self::SystemOperation => "system operation",
            Self::BuildCompile => "build/compile",
            Self::ComponentLocal => "component-local",
            Self::Diagnostic => "diagnostic/internal",
        }
    }

    /// Prefix used to name unlisted ids inside this category.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::UserInteraction => "USER_INTERACTION",
            Self::ApiOperation => "API_OPERATION",
            Self::StateManagement => "STATE_MANAGEMENT",
            Self::UiOperation => "UI_OPERATION",
            Self::AudioProcessing => "AUDIO_PROCESSING",
            Self::SystemOperation => "SYSTEM_OPERATION",
            Self::BuildCompile => "BUILD_COMPILE",
            Self::ComponentLocal => "COMPONENT_LOCAL",
            Self::Diagnostic => "DIAGNOSTIC",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Checkpoint ids emitted by this crate.
pub mod ids {
    use std::ops::RangeInclusive;

    // Adaptive dispatcher
    /// A call was handed to the native backend.
    pub const NATIVE_CALL: u32 = 201;
    /// The native backend produced a result.
    pub const NATIVE_RESULT: u32 = 202;
    /// The native backend failed; the call falls through to the fallback.
    pub const NATIVE_FAILED: u32 = 203;
    /// The fallback catalog is serving the call.
    pub const FALLBACK_USED: u32 = 204;
    /// Dispatcher checkpoints.
    pub const DISPATCH_RANGE: RangeInclusive<u32> = 200..=209;

    // Fallback catalog
    /// The fallback catalog received a call.
    pub const FALLBACK_CALL: u32 = 210;
    /// The fallback catalog produced a response.
    pub const FALLBACK_RESPONSE: u32 = 211;
    /// The requested operation is not in the catalog.
    pub const FALLBACK_UNKNOWN_OPERATION: u32 = 212;

    // Coaching pipeline
    /// A coaching prompt was generated.
    pub const COACHING_PROMPT_GENERATED: u32 = 220;
    /// Coaching checkpoints.
    pub const COACHING_RANGE: RangeInclusive<u32> = 220..=229;

    // Recognition supervisor
    /// An explicit start was requested.
    pub const SESSION_START_REQUESTED: u32 = 500;
    /// The platform reported that the session started.
    pub const SESSION_STARTED: u32 = 501;
    /// An interim transcript was broadcast.
    pub const INTERIM_RESULT: u32 = 502;
    /// A final transcript was broadcast.
    pub const FINAL_RESULT: u32 = 503;
    /// The platform session ended.
    pub const SESSION_ENDED: u32 = 504;
    /// The platform session reported an error.
    pub const SESSION_ERROR: u32 = 505;
    /// A restart was scheduled.
    pub const RESTART_SCHEDULED: u32 = 506;
    /// A scheduled restart fired.
    pub const RESTART_ATTEMPT: u32 = 507;
    /// A restart attempt failed.
    pub const RESTART_FAILED: u32 = 508;
    /// No restart attempts remain.
    pub const RESTARTS_EXHAUSTED: u32 = 509;
    /// The session was stopped on request.
    pub const SESSION_STOPPED: u32 = 510;
    /// An explicit start failed.
    pub const SESSION_START_FAILED: u32 = 511;
    /// A fatal error terminated the session.
    pub const SESSION_TERMINATED: u32 = 512;
    /// Recognition supervisor checkpoints.
    pub const RECOGNITION_RANGE: RangeInclusive<u32> = 500..=599;

    // Document store
    /// A document was ingested.
    pub const DOCUMENT_INGESTED: u32 = 800;
    /// A document could not be ingested.
    pub const DOCUMENT_INGEST_FAILED: u32 = 801;
    /// A document was removed.
    pub const DOCUMENT_REMOVED: u32 = 802;
    /// Document processing checkpoints.
    pub const DOCUMENT_RANGE: RangeInclusive<u32> = 800..=809;
    /// A search completed.
    pub const SEARCH_COMPLETED: u32 = 820;
    /// A search failed.
    pub const SEARCH_FAILED: u32 = 821;
    /// Search checkpoints.
    pub const SEARCH_RANGE: RangeInclusive<u32> = 820..=829;

    // Diagnostics
    /// A scripted diagnostic run started.
    pub const DIAGNOSTIC_RUN: u32 = 900;
}

/// Per-id names, sorted by id.
const CHECKPOINT_NAMES: &[(u32, &str)] = &[
    (ids::NATIVE_CALL, "NATIVE_CALL"),
    (ids::NATIVE_RESULT, "NATIVE_RESULT"),
    (ids::NATIVE_FAILED, "NATIVE_FAILED"),
    (ids::FALLBACK_USED, "FALLBACK_USED"),
    (ids::FALLBACK_CALL, "FALLBACK_CALL"),
    (ids::FALLBACK_RESPONSE, "FALLBACK_RESPONSE"),
    (ids::FALLBACK_UNKNOWN_OPERATION, "FALLBACK_UNKNOWN_OPERATION"),
    (ids::COACHING_PROMPT_GENERATED, "COACHING_PROMPT_GENERATED"),
    (ids::SESSION_START_REQUESTED, "SESSION_START_REQUESTED"),
    (ids::SESSION_STARTED, "SESSION_STARTED"),
    (ids::INTERIM_RESULT, "INTERIM_RESULT"),
    (ids::FINAL_RESULT, "FINAL_RESULT"),
    (ids::SESSION_ENDED, "SESSION_ENDED"),
    (ids::SESSION_ERROR, "SESSION_ERROR"),
    (ids::RESTART_SCHEDULED, "RESTART_SCHEDULED"),
    (ids::RESTART_ATTEMPT, "RESTART_ATTEMPT"),
    (ids::RESTART_FAILED, "RESTART_FAILED"),
    (ids::RESTARTS_EXHAUSTED, "RESTARTS_EXHAUSTED"),
    (ids::SESSION_STOPPED, "SESSION_STOPPED"),
    (ids::SESSION_START_FAILED, "SESSION_START_FAILED"),
    (ids::SESSION_TERMINATED, "SESSION_TERMINATED"),
    (ids::DOCUMENT_INGESTED, "DOCUMENT_INGESTED"),
    (ids::DOCUMENT_INGEST_FAILED, "DOCUMENT_INGEST_FAILED"),
    (ids::DOCUMENT_REMOVED, "DOCUMENT_REMOVED"),
    (ids::SEARCH_COMPLETED, "SEARCH_COMPLETED"),
    (ids::SEARCH_FAILED, "SEARCH_FAILED"),
    (ids::DIAGNOSTIC_RUN, "DIAGNOSTIC_RUN"),
];

/// Resolve the display name for a checkpoint id.
#[must_use]
pub fn checkpoint_name(id: u32) -> String {
    if let Ok(index) = CHECKPOINT_NAMES.binary_search_by_key(&id, |(known, _)| *known) {
        return CHECKPOINT_NAMES[index].1.to_string();
    }
    match Category::of(id) {
        Some(category) => format!("{}_{id}", category.prefix()),
        None => format!("LED_{id}"),
    }
}
