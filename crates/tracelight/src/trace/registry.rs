//! The trace registry: every live trail plus the merged and failure streams.
//!
//! A registry is a cheap, cloneable handle over shared state. Components
//! receive one through their constructors; [`TraceRegistry::global`] offers
//! a lazily-initialized process-wide instance for callers that want one.
//!
//! Lock order is always registry state first, then a trail's sequence. All
//! appends happen under the registry lock so a trail's sequence stays an
//! order-preserving subsequence of the merged stream even when several
//! threads record at once.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::Utc;
use tracing::debug;

use super::event::TraceEvent;
use super::trail::Trail;
use crate::config::TraceConfig;

/// A trail's event sequence, shared between the trail and the registry.
pub(crate) type SharedSequence = Arc<Mutex<Vec<TraceEvent>>>;

static GLOBAL_REGISTRY: OnceLock<TraceRegistry> = OnceLock::new();

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) trails: HashMap<String, SharedSequence>,
    pub(crate) merged: Vec<TraceEvent>,
    pub(crate) failures: Vec<TraceEvent>,
}

/// Handle to a set of trails and their merged event streams.
#[derive(Debug, Clone, Default)]
pub struct TraceRegistry {
    state: Arc<Mutex<RegistryState>>,
    limits: TraceConfig,
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Trace state is append-only diagnostics; a panic mid-append leaves it
/// usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop the oldest events once `events` grows past `capacity`.
fn trim(events: &mut Vec<TraceEvent>, capacity: usize, retain: usize) -> usize {
    if events.len() <= capacity {
        return 0;
    }
    let excess = events.len() - retain.min(events.len());
    events.drain(..excess);
    excess
}

impl TraceRegistry {
    /// Create an empty registry with the default retention bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with custom retention bounds.
    #[must_use]
    pub fn with_config(limits: TraceConfig) -> Self {
        Self {
            state: Arc::default(),
            limits,
        }
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static TraceRegistry {
        GLOBAL_REGISTRY.get_or_init(TraceRegistry::new)
    }

    /// Create a trail for `component` registered with this registry.
    #[must_use]
    pub fn trail(&self, component: impl Into<String>) -> Trail {
        Trail::new(self, component)
    }

    /// Retention bounds in effect.
    #[must_use]
    pub fn limits(&self) -> &TraceConfig {
        &self.limits
    }

    /// Register a trail's sequence, replacing any earlier trail of the same
    /// name. The replaced trail keeps its own sequence but is no longer
    /// reachable through the registry.
    pub(crate) fn register(&self, component: &str, sequence: SharedSequence) {
        let mut state = lock(&self.state);
        if state
            .trails
            .insert(component.to_string(), sequence)
            .is_some()
        {
            debug!(component, "trail re-registered, previous trail orphaned");
        }
    }

    /// Append an event to `sequence` and to the merged stream, and to the
    /// failure stream when it is a failure.
    ///
    /// The timestamp is assigned here, clamped so it never runs backwards
    /// within the trail.
    pub(crate) fn record(&self, sequence: &SharedSequence, mut event: TraceEvent) -> TraceEvent {
        let mut state = lock(&self.state);
        let mut local = lock(sequence);

        let now = Utc::now().timestamp_millis();
        event.timestamp = local.last().map_or(now, |last| now.max(last.timestamp));

        local.push(event.clone());
        let dropped = trim(&mut local, self.limits.trail_capacity, self.limits.trail_retain);
        if dropped > 0 {
            debug!(component = %event.component, dropped, "trail trimmed");
        }
        drop(local);

        if event.is_failure() {
            state.failures.push(event.clone());
        }
        state.merged.push(event.clone());
        let dropped = trim(
            &mut state.merged,
            self.limits.global_capacity,
            self.limits.global_retain,
        );
        if dropped > 0 {
            debug!(dropped, "merged stream trimmed");
        }

        event
    }

    /// Empty every registered trail, the trail map, and both streams.
    pub fn clear_all(&self) {
        let mut state = lock(&self.state);
        for sequence in state.trails.values() {
            lock(sequence).clear();
        }
        state.trails.clear();
        state.merged.clear();
        state.failures.clear();
        debug!("trace registry cleared");
    }

    /// Every registered trail's sequence, keyed by component name.
    #[must_use]
    pub fn all_trails(&self) -> BTreeMap<String, Vec<TraceEvent>> {
        let state = lock(&self.state);
        state
            .trails
            .iter()
            .map(|(name, sequence)| (name.clone(), lock(sequence).clone()))
            .collect()
    }

    /// The merged stream, oldest first.
    #[must_use]
    pub fn global_trail(&self) -> Vec<TraceEvent> {
        lock(&self.state).merged.clone()
    }

    /// The failure stream, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<TraceEvent> {
        lock(&self.state).failures.clone()
    }

    /// One registered trail's sequence.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<Vec<TraceEvent>> {
        let state = lock(&self.state);
        state.trails.get(name).map(|sequence| lock(sequence).clone())
    }

    /// Names of every registered trail.
    #[must_use]
    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.state).trails.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run `f` against a consistent view of the registry state.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        f(&lock(&self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_registry() -> TraceRegistry {
        TraceRegistry::with_config(TraceConfig {
            trail_capacity: 4,
            trail_retain: 2,
            global_capacity: 6,
            global_retain: 3,
        })
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let mut events: Vec<TraceEvent> = (0..5)
            .map(|i| TraceEvent::success("C", 100 + i, None, i64::from(i)))
            .collect();
        assert_eq!(trim(&mut events, 4, 2), 3);
        let ids: Vec<u32> = events.iter().map(|e| e.checkpoint_id).collect();
        assert_eq!(ids, vec![103, 104]);
    }

    #[test]
    fn test_trim_below_capacity_is_noop() {
        let mut events = vec![TraceEvent::success("C", 100, None, 0)];
        assert_eq!(trim(&mut events, 1, 1), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_trail_and_merged_bounds() {
        let registry = small_registry();
        let trail = registry.trail("Bounded");
        for id in 0..7 {
            trail.light(100 + id, None);
        }

        // Trail trims at 5 -> 2, then grows to 4 with events 5 and 6.
        let local: Vec<u32> = trail.sequence().iter().map(|e| e.checkpoint_id).collect();
        assert_eq!(local, vec![103, 104, 105, 106]);

        // Merged trims at 7 -> 3.
        let merged: Vec<u32> = registry
            .global_trail()
            .iter()
            .map(|e| e.checkpoint_id)
            .collect();
        assert_eq!(merged, vec![104, 105, 106]);
    }

    #[test]
    fn test_failures_survive_merged_trimming() {
        let registry = small_registry();
        let trail = registry.trail("Flaky");
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        trail.fail(600, &err);
        for id in 0..10 {
            trail.light(100 + id, None);
        }

        assert!(registry.global_trail().iter().all(|e| e.success));
        let failures = registry.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].checkpoint_id, 600);
    }

    #[test]
    fn test_clear_all_empties_everything() {
        let registry = TraceRegistry::new();
        let trail = registry.trail("Clearable");
        trail.light(100, None);
        trail.fail(101, &std::io::Error::new(std::io::ErrorKind::Other, "x"));

        registry.clear_all();

        assert!(registry.all_trails().is_empty());
        assert!(registry.global_trail().is_empty());
        assert!(registry.failures().is_empty());
        assert!(trail.sequence().is_empty());
    }

    #[test]
    fn test_component_lookup() {
        let registry = TraceRegistry::new();
        registry.trail("A").light(100, None);
        let _ = registry.trail("B");

        assert_eq!(registry.component("A").unwrap().len(), 1);
        assert!(registry.component("B").unwrap().is_empty());
        assert!(registry.component("missing").is_none());
        assert_eq!(registry.component_names(), vec!["A", "B"]);
    }

    #[test]
    fn test_registries_are_independent() {
        let first = TraceRegistry::new();
        let second = TraceRegistry::new();
        first.trail("Only").light(100, None);

        assert_eq!(first.global_trail().len(), 1);
        assert!(second.global_trail().is_empty());
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = TraceRegistry::global();
        let b = TraceRegistry::global();
        assert!(Arc::ptr_eq(&a.state, &b.state));
    }

    #[test]
    fn test_concurrent_recording_keeps_trail_order() {
        let registry = TraceRegistry::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let trail = registry.trail(format!("Worker{t}"));
                std::thread::spawn(move || {
                    for i in 0..20 {
                        trail.light(100 + i, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let merged = registry.global_trail();
        assert_eq!(merged.len(), 80);
        for (name, sequence) in registry.all_trails() {
            let from_merged: Vec<u32> = merged
                .iter()
                .filter(|e| e.component == name)
                .map(|e| e.checkpoint_id)
                .collect();
            let local: Vec<u32> = sequence.iter().map(|e| e.checkpoint_id).collect();
            assert_eq!(from_merged, local);
        }
    }
}
