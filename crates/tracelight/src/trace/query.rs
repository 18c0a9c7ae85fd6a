//! Read-only diagnostics computed over a registry.
//!
//! Every query takes a snapshot of the merged stream and computes its result
//! with a pure function, so queries never affect recording.
//!
//! The `average_span_ms` fields are a deliberately crude proxy: the spread
//! between the newest and oldest matching timestamps divided by the number
//! of matching events. It is not a per-operation latency; there is no
//! pairing of start and end checkpoints in the data model. Empty selections
//! report `0.0`.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Serialize;

use super::checkpoint::ids;
use super::event::TraceEvent;
use super::registry::{lock, TraceRegistry};

/// Number of failures reported in [`TraceStatistics::recent_failures`].
const RECENT_FAILURE_COUNT: usize = 10;

/// Selects events from the merged stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    range: Option<RangeInclusive<u32>>,
    component: Option<String>,
}

impl EventFilter {
    /// A filter matching every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to checkpoint ids inside `range`.
    #[must_use]
    pub fn range(mut self, range: RangeInclusive<u32>) -> Self {
        self.range = Some(range);
        self
    }

    /// Restrict to events recorded by `component`.
    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Check if `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &TraceEvent) -> bool {
        self.range
            .as_ref()
            .map_or(true, |range| range.contains(&event.checkpoint_id))
            && self
                .component
                .as_deref()
                .map_or(true, |component| event.component == component)
    }
}

/// Counts over a filtered selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rollup {
    /// Matching events.
    pub total: usize,
    /// Matching successes.
    pub successes: usize,
    /// Matching failures.
    pub failures: usize,
    /// Timestamp spread divided by `total`.
    pub average_span_ms: f64,
}

/// Dispatcher activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NativeCallStats {
    /// Calls handed to a native backend.
    pub native_calls: usize,
    /// Native calls that produced a result.
    pub native_results: usize,
    /// Native calls that failed.
    pub native_failures: usize,
    /// Calls served by the fallback catalog.
    pub fallback_uses: usize,
    /// Crude span over dispatcher checkpoints.
    pub average_span_ms: f64,
}

/// Document ingestion activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentProcessingStats {
    /// Documents ingested.
    pub documents_processed: usize,
    /// Failed ingestions.
    pub failures: usize,
    /// Chunks produced, summed over events that report a chunk count.
    pub total_chunks: u64,
    /// Crude span over document checkpoints.
    pub average_span_ms: f64,
}

/// Document search activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    /// Completed searches.
    pub searches: usize,
    /// Failed searches.
    pub failures: usize,
    /// Mean result count over searches that report one.
    pub average_results: f64,
    /// Mean best score over searches that report one.
    pub average_top_score: f64,
}

/// Coaching prompt activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoachingStats {
    /// Prompts generated.
    pub prompts_generated: usize,
    /// Failures in the coaching range.
    pub failures: usize,
    /// Mean confidence over prompts that report one.
    pub average_confidence: f64,
    /// Crude span over coaching checkpoints.
    pub average_span_ms: f64,
}

/// Recognition session transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioModeStats {
    /// Sessions that reached the active state.
    pub session_starts: usize,
    /// Restart attempts.
    pub restarts: usize,
    /// Explicit stops.
    pub stops: usize,
    /// Failures recorded by the supervisor.
    pub errors: usize,
    /// Interim transcripts broadcast.
    pub interim_results: usize,
    /// Final transcripts broadcast.
    pub final_results: usize,
}

/// Registry-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalStatistics {
    /// Events in the merged stream.
    pub total_events: usize,
    /// Events in the failure stream.
    pub total_failures: usize,
    /// Percentage of merged events that are not failures.
    pub success_rate: f64,
    /// Registered trails.
    pub active_components: usize,
}

/// Per-trail totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentStatistics {
    /// Events in the trail.
    pub total_operations: usize,
    /// Failures in the trail.
    pub failures: usize,
    /// Percentage of trail events that are not failures.
    pub success_rate: f64,
    /// Name of the newest event.
    pub last_operation: Option<String>,
}

/// The full statistics report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceStatistics {
    /// Registry-wide totals.
    pub global: GlobalStatistics,
    /// Totals per registered trail.
    pub components: BTreeMap<String, ComponentStatistics>,
    /// The newest failures, newest first.
    pub recent_failures: Vec<TraceEvent>,
}

/// Spread of timestamps divided by count; `0.0` when empty.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn average_span(events: &[&TraceEvent]) -> f64 {
    let (Some(min), Some(max)) = (
        events.iter().map(|e| e.timestamp).min(),
        events.iter().map(|e| e.timestamp).max(),
    ) else {
        return 0.0;
    };
    (max - min) as f64 / events.len() as f64
}

/// Mean of a numeric payload field over the events that carry it.
#[allow(clippy::cast_precision_loss)]
fn mean_field(events: &[&TraceEvent], field: &str) -> f64 {
    let values: Vec<f64> = events.iter().filter_map(|e| e.data_f64(field)).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn select<'a>(events: &'a [TraceEvent], filter: &EventFilter) -> Vec<&'a TraceEvent> {
    events.iter().filter(|e| filter.matches(e)).collect()
}

fn count_id(events: &[&TraceEvent], id: u32) -> usize {
    events
        .iter()
        .filter(|e| e.success && e.checkpoint_id == id)
        .count()
}

fn count_failed_id(events: &[&TraceEvent], id: u32) -> usize {
    events
        .iter()
        .filter(|e| e.is_failure() && e.checkpoint_id == id)
        .count()
}

fn count_failures(events: &[&TraceEvent]) -> usize {
    events.iter().filter(|e| e.is_failure()).count()
}

/// Count and span a selection of events.
#[must_use]
pub fn compute_rollup(events: &[TraceEvent], filter: &EventFilter) -> Rollup {
    let selected = select(events, filter);
    let failures = count_failures(&selected);
    Rollup {
        total: selected.len(),
        successes: selected.len() - failures,
        failures,
        average_span_ms: average_span(&selected),
    }
}

/// Dispatcher rollup over a slice of events.
#[must_use]
pub fn compute_native_call_stats(events: &[TraceEvent]) -> NativeCallStats {
    let selected = select(events, &EventFilter::new().range(ids::DISPATCH_RANGE));
    NativeCallStats {
        native_calls: count_id(&selected, ids::NATIVE_CALL),
        native_results: count_id(&selected, ids::NATIVE_RESULT),
        native_failures: count_failed_id(&selected, ids::NATIVE_FAILED),
        fallback_uses: count_id(&selected, ids::FALLBACK_USED),
        average_span_ms: average_span(&selected),
    }
}

/// Document ingestion rollup over a slice of events.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn compute_document_processing_stats(events: &[TraceEvent]) -> DocumentProcessingStats {
    let selected = select(events, &EventFilter::new().range(ids::DOCUMENT_RANGE));
    let ingested: Vec<&TraceEvent> = selected
        .iter()
        .copied()
        .filter(|e| e.success && e.checkpoint_id == ids::DOCUMENT_INGESTED)
        .collect();
    DocumentProcessingStats {
        documents_processed: ingested.len(),
        failures: count_failures(&selected),
        total_chunks: ingested
            .iter()
            .filter_map(|e| e.data_f64("chunks"))
            .map(|chunks| chunks.max(0.0) as u64)
            .sum(),
        average_span_ms: average_span(&selected),
    }
}

/// Search rollup over a slice of events.
#[must_use]
pub fn compute_search_stats(events: &[TraceEvent]) -> SearchStats {
    let selected = select(events, &EventFilter::new().range(ids::SEARCH_RANGE));
    let completed: Vec<&TraceEvent> = selected
        .iter()
        .copied()
        .filter(|e| e.success && e.checkpoint_id == ids::SEARCH_COMPLETED)
        .collect();
    SearchStats {
        searches: completed.len(),
        failures: count_failures(&selected),
        average_results: mean_field(&completed, "results"),
        average_top_score: mean_field(&completed, "top_score"),
    }
}

/// Coaching rollup over a slice of events.
#[must_use]
pub fn compute_coaching_stats(events: &[TraceEvent]) -> CoachingStats {
    let selected = select(events, &EventFilter::new().range(ids::COACHING_RANGE));
    let generated: Vec<&TraceEvent> = selected
        .iter()
        .copied()
        .filter(|e| e.success && e.checkpoint_id == ids::COACHING_PROMPT_GENERATED)
        .collect();
    CoachingStats {
        prompts_generated: generated.len(),
        failures: count_failures(&selected),
        average_confidence: mean_field(&generated, "confidence_score"),
        average_span_ms: average_span(&selected),
    }
}

/// Recognition session rollup over a slice of events.
#[must_use]
pub fn compute_audio_mode_stats(events: &[TraceEvent]) -> AudioModeStats {
    let selected = select(events, &EventFilter::new().range(ids::RECOGNITION_RANGE));
    AudioModeStats {
        session_starts: count_id(&selected, ids::SESSION_STARTED),
        restarts: count_id(&selected, ids::RESTART_ATTEMPT),
        stops: count_id(&selected, ids::SESSION_STOPPED),
        errors: count_failures(&selected),
        interim_results: count_id(&selected, ids::INTERIM_RESULT),
        final_results: count_id(&selected, ids::FINAL_RESULT),
    }
}

fn component_statistics(sequence: &[TraceEvent]) -> ComponentStatistics {
    let failures = sequence.iter().filter(|e| e.is_failure()).count();
    ComponentStatistics {
        total_operations: sequence.len(),
        failures,
        success_rate: percentage(sequence.len() - failures, sequence.len()),
        last_operation: sequence.last().map(|e| e.name.clone()),
    }
}

impl TraceRegistry {
    /// Registry-wide and per-component statistics.
    #[must_use]
    pub fn statistics(&self) -> TraceStatistics {
        self.with_state(|state| {
            let total_events = state.merged.len();
            let total_failures = state.failures.len();
            let merged_failures = state.merged.iter().filter(|e| e.is_failure()).count();
            let components = state
                .trails
                .iter()
                .map(|(name, sequence)| (name.clone(), component_statistics(&lock(sequence))))
                .collect();

            TraceStatistics {
                global: GlobalStatistics {
                    total_events,
                    total_failures,
                    success_rate: percentage(total_events - merged_failures, total_events),
                    active_components: state.trails.len(),
                },
                components,
                recent_failures: state
                    .failures
                    .iter()
                    .rev()
                    .take(RECENT_FAILURE_COUNT)
                    .cloned()
                    .collect(),
            }
        })
    }

    /// Counts and span over the merged events selected by `filter`.
    #[must_use]
    pub fn rollup(&self, filter: &EventFilter) -> Rollup {
        self.with_state(|state| compute_rollup(&state.merged, filter))
    }

    /// Dispatcher rollup.
    #[must_use]
    pub fn native_call_stats(&self) -> NativeCallStats {
        self.with_state(|state| compute_native_call_stats(&state.merged))
    }

    /// Document ingestion rollup.
    #[must_use]
    pub fn document_processing_stats(&self) -> DocumentProcessingStats {
        self.with_state(|state| compute_document_processing_stats(&state.merged))
    }

    /// Search rollup.
    #[must_use]
    pub fn search_stats(&self) -> SearchStats {
        self.with_state(|state| compute_search_stats(&state.merged))
    }

    /// Coaching rollup.
    #[must_use]
    pub fn coaching_stats(&self) -> CoachingStats {
        self.with_state(|state| compute_coaching_stats(&state.merged))
    }

    /// Recognition session rollup.
    #[must_use]
    pub fn audio_mode_stats(&self) -> AudioModeStats {
        self.with_state(|state| compute_audio_mode_stats(&state.merged))
    }
}
