//! Per-component trace trails.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};

use super::event::{TraceError, TraceEvent};
use super::registry::{lock, SharedSequence, TraceRegistry};

/// An ordered log of trace events for one named component.
///
/// Creating a trail registers it with its registry, replacing any trail
/// previously registered under the same name. Clones share one sequence.
#[derive(Debug, Clone)]
pub struct Trail {
    component: String,
    sequence: SharedSequence,
    registry: TraceRegistry,
}

impl Trail {
    /// Create and register a trail for `component`.
    #[must_use]
    pub fn new(registry: &TraceRegistry, component: impl Into<String>) -> Self {
        let component = component.into();
        let sequence: SharedSequence = Arc::new(Mutex::new(Vec::new()));
        registry.register(&component, Arc::clone(&sequence));
        Self {
            component,
            sequence,
            registry: registry.clone(),
        }
    }

    /// The component this trail records for.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The registry this trail reports to.
    #[must_use]
    pub fn registry(&self) -> &TraceRegistry {
        &self.registry
    }

    /// Record a successful checkpoint.
    pub fn light(&self, checkpoint_id: u32, data: Option<Value>) {
        let event = TraceEvent::success(&self.component, checkpoint_id, data, 0);
        let event = self.registry.record(&self.sequence, event);
        debug!(
            checkpoint = checkpoint_id,
            name = %event.name,
            component = %self.component,
            "checkpoint"
        );
    }

    /// Record a failed checkpoint, capturing the error's message and debug
    /// rendering.
    pub fn fail<E: std::error::Error + ?Sized>(&self, checkpoint_id: u32, error: &E) {
        let event = TraceEvent::failure(
            &self.component,
            checkpoint_id,
            TraceError::from_error(error),
            0,
        );
        let event = self.registry.record(&self.sequence, event);
        warn!(
            checkpoint = checkpoint_id,
            name = %event.name,
            component = %self.component,
            error = %error,
            "checkpoint failed"
        );
    }

    /// A copy of this trail's events, oldest first.
    #[must_use]
    pub fn sequence(&self) -> Vec<TraceEvent> {
        lock(&self.sequence).clone()
    }

    /// This trail's failure events, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<TraceEvent> {
        lock(&self.sequence)
            .iter()
            .filter(|event| event.is_failure())
            .cloned()
            .collect()
    }

    /// Number of events currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.sequence).len()
    }

    /// Check if the trail holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
