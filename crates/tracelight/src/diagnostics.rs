//! The scripted diagnostics exercise behind `tracelight diagnostics`.
//!
//! The exercise walks the whole fallback catalog through an
//! [`AdaptiveDispatcher`] that has no native backend, calls an unknown
//! operation, and runs a document ingest and search against an in-memory
//! store. Everything it does is recorded in the registry it is given, so the
//! resulting [`DiagnosticReport`] shows what a healthy host looks like.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::dispatch::{AdaptiveDispatcher, FallbackProvider, NoBackend, Operation};
use crate::error::Result;
use crate::recognition::{RecognitionSupervisor, UnavailableEngine};
use crate::storage::DocumentStore;
use crate::trace::{
    ids, AudioModeStats, CoachingStats, DocumentProcessingStats, NativeCallStats, SearchStats,
    TraceRegistry, TraceStatistics,
};

/// Operation name used to exercise the unknown-operation path.
pub const UNKNOWN_OPERATION: &str = "unknown_operation_check";

const SAMPLE_TRANSCRIPT: &str = "The price seems high and I need to think about the timeline";

const SAMPLE_DOCUMENT: &str = "Pricing objections usually hide a question about value. \
    Restate the outcome the customer cares about before you talk about cost. \
    When the timeline is the concern, offer a phased rollout that delivers \
    something useful in the first month. Competitor comparisons go better \
    when you focus on integration effort rather than feature lists.";

/// Statistics and rollups read from one registry.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    /// Global and per-component statistics.
    pub statistics: TraceStatistics,
    /// Dispatcher rollup.
    pub native_calls: NativeCallStats,
    /// Document ingestion rollup.
    pub document_processing: DocumentProcessingStats,
    /// Document search rollup.
    pub search: SearchStats,
    /// Coaching prompt rollup.
    pub coaching: CoachingStats,
    /// Recognition session rollup.
    pub audio_mode: AudioModeStats,
}

impl DiagnosticReport {
    /// Read every statistic `registry` offers.
    #[must_use]
    pub fn collect(registry: &TraceRegistry) -> Self {
        Self {
            statistics: registry.statistics(),
            native_calls: registry.native_call_stats(),
            document_processing: registry.document_processing_stats(),
            search: registry.search_stats(),
            coaching: registry.coaching_stats(),
            audio_mode: registry.audio_mode_stats(),
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let global = &self.statistics.global;
        writeln!(f, "Trace Statistics")?;
        writeln!(f, "================")?;
        writeln!(f)?;
        writeln!(f, "  Events:             {}", global.total_events)?;
        writeln!(f, "  Failures:           {}", global.total_failures)?;
        writeln!(f, "  Success rate:       {:.1}%", global.success_rate)?;
        writeln!(f, "  Components:         {}", global.active_components)?;

        if !self.statistics.components.is_empty() {
            writeln!(f)?;
            writeln!(f, "[Components]")?;
            for (name, stats) in &self.statistics.components {
                writeln!(
                    f,
                    "  {name:<20} {:>5} ops {:>4} failed {:>6.1}%  last: {}",
                    stats.total_operations,
                    stats.failures,
                    stats.success_rate,
                    stats.last_operation.as_deref().unwrap_or("-"),
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "[Dispatch]")?;
        writeln!(f, "  Native calls:       {}", self.native_calls.native_calls)?;
        writeln!(f, "  Native results:     {}", self.native_calls.native_results)?;
        writeln!(f, "  Native failures:    {}", self.native_calls.native_failures)?;
        writeln!(f, "  Fallback uses:      {}", self.native_calls.fallback_uses)?;
        writeln!(
            f,
            "  Average span (ms):  {:.2}",
            self.native_calls.average_span_ms
        )?;

        writeln!(f)?;
        writeln!(f, "[Documents]")?;
        writeln!(
            f,
            "  Processed:          {}",
            self.document_processing.documents_processed
        )?;
        writeln!(f, "  Failures:           {}", self.document_processing.failures)?;
        writeln!(f, "  Chunks:             {}", self.document_processing.total_chunks)?;
        writeln!(f, "  Searches:           {}", self.search.searches)?;
        writeln!(f, "  Average results:    {:.2}", self.search.average_results)?;
        writeln!(f, "  Average top score:  {:.2}", self.search.average_top_score)?;

        writeln!(f)?;
        writeln!(f, "[Coaching]")?;
        writeln!(f, "  Prompts:            {}", self.coaching.prompts_generated)?;
        writeln!(f, "  Average confidence: {:.2}", self.coaching.average_confidence)?;

        writeln!(f)?;
        writeln!(f, "[Audio]")?;
        writeln!(f, "  Session starts:     {}", self.audio_mode.session_starts)?;
        writeln!(f, "  Restarts:           {}", self.audio_mode.restarts)?;
        writeln!(f, "  Stops:              {}", self.audio_mode.stops)?;
        writeln!(f, "  Errors:             {}", self.audio_mode.errors)?;

        if !self.statistics.recent_failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "[Recent failures]")?;
            for event in &self.statistics.recent_failures {
                let message = event
                    .error
                    .as_ref()
                    .map_or("", |error| error.message.as_str());
                writeln!(f, "  {:<20} {:<28} {message}", event.component, event.name)?;
            }
        }
        Ok(())
    }
}

/// Arguments the exercise passes with `operation`.
fn sample_args(operation: Operation) -> Value {
    match operation {
        Operation::CoachingPrompt => json!({ "transcript": SAMPLE_TRANSCRIPT }),
        _ => Value::Null,
    }
}

/// Run the scripted exercise against `registry` and report on it.
///
/// # Errors
///
/// Returns an error if a catalog operation fails, if the unknown-operation
/// call fails for any other reason than being unknown, or if the in-memory
/// document store cannot be used.
pub async fn run_exercise(config: &Config, registry: &TraceRegistry) -> Result<DiagnosticReport> {
    let trail = registry.trail("Diagnostics");
    trail.light(
        ids::DIAGNOSTIC_RUN,
        Some(json!({ "operations": Operation::ALL.len() })),
    );

    let supervisor = RecognitionSupervisor::new(
        Arc::new(UnavailableEngine),
        &config.recognition,
        registry,
    );
    let fallback =
        FallbackProvider::new(registry, config.dispatch.clone()).with_supervisor(supervisor);
    let dispatcher = AdaptiveDispatcher::new(registry, Arc::new(NoBackend), fallback);

    for operation in Operation::ALL {
        dispatcher
            .dispatch(operation.name(), sample_args(operation))
            .await?;
    }

    match dispatcher.dispatch(UNKNOWN_OPERATION, Value::Null).await {
        Err(err) if err.is_unknown_operation() => {}
        Err(err) => return Err(err),
        Ok(_) => {
            return Err(crate::error::Error::internal(format!(
                "{UNKNOWN_OPERATION} unexpectedly succeeded"
            )))
        }
    }

    let store = DocumentStore::open_in_memory(registry)?
        .with_max_chunk_size(config.storage.max_chunk_size);
    store.ingest("diagnostics.txt", SAMPLE_DOCUMENT)?;
    store.search("pricing timeline", 3)?;

    let report = DiagnosticReport::collect(registry);
    info!(
        events = report.statistics.global.total_events,
        failures = report.statistics.global.total_failures,
        "diagnostics exercise finished"
    );
    Ok(report)
}
