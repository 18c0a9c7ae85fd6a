//! Supervision of a continuous speech recognition session.
//!
//! The supervisor keeps at most one platform session open and restarts it
//! when it ends or fails while the caller still wants it running. The
//! restart policy is fixed: one attempt after the restart delay, one retry
//! after the retry delay if that attempt fails, then the supervisor gives up
//! and broadcasts [`SupervisorEvent::RestartsExhausted`]. A session that
//! comes back successfully starts the cycle over for its next failure.
//!
//! Every opened session gets a new generation number. Events and timers
//! carry the generation they were created for, so anything belonging to a
//! replaced or stopped session is dropped on arrival.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use super::engine::{PlatformEvent, RecognitionEngine, RecognitionHandle, Segment, SessionOptions};
use crate::config::RecognitionConfig;
use crate::error::{Error, RecognitionError, RecognitionErrorKind, Result};
use crate::trace::{ids, TraceRegistry, Trail};

/// Restart attempts made after one unexpected end before giving up.
pub const MAX_RESTART_ATTEMPTS: u32 = 2;

const EVENT_CAPACITY: usize = 64;

/// Where the supervised session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session is open or wanted.
    Idle,
    /// A session has been requested or a restart is pending.
    Starting,
    /// The platform reported the session as capturing.
    Active,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// A transcript broadcast to listeners.
///
/// `is_final` and `is_interim` are always opposite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    /// Recognized text.
    pub text: String,
    /// Broadcast time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// The text is settled.
    pub is_final: bool,
    /// The text may still be revised.
    pub is_interim: bool,
}

impl TranscriptEvent {
    fn new(text: String, is_final: bool) -> Self {
        Self {
            text,
            timestamp: Utc::now().timestamp_millis(),
            is_final,
            is_interim: !is_final,
        }
    }
}

/// Everything the supervisor broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A final or interim transcript.
    Transcript(TranscriptEvent),
    /// A fatal platform error ended the session; no restart follows.
    Terminated {
        /// The fatal error kind.
        kind: RecognitionErrorKind,
    },
    /// Every restart attempt failed; the session is abandoned.
    RestartsExhausted {
        /// Attempts made.
        attempts: u32,
        /// The last attempt's error.
        message: String,
    },
}

struct SessionSlot {
    state: SessionState,
    desired_active: bool,
    generation: u64,
    handle: Option<Box<dyn RecognitionHandle>>,
    pump: Option<JoinHandle<()>>,
    pending_restart: Option<JoinHandle<()>>,
}

impl SessionSlot {
    /// Stop the platform session and its event pump.
    fn stop_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
        self.release_pump();
    }

    fn release_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn cancel_restart(&mut self) {
        if let Some(pending) = self.pending_restart.take() {
            pending.abort();
        }
    }
}

struct Inner {
    engine: Arc<dyn RecognitionEngine>,
    options: SessionOptions,
    restart_delay: Duration,
    retry_delay: Duration,
    trail: Trail,
    events: broadcast::Sender<SupervisorEvent>,
    slot: Mutex<SessionSlot>,
}

/// Owns the lifecycle of one continuous recognition session.
///
/// Cloning yields another handle to the same supervisor. Starting a session
/// needs a running tokio runtime, since events and restart timers are
/// driven by spawned tasks.
#[derive(Clone)]
pub struct RecognitionSupervisor {
    inner: Arc<Inner>,
}

impl RecognitionSupervisor {
    /// Create an idle supervisor over `engine`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        config: &RecognitionConfig,
        registry: &TraceRegistry,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                engine,
                options: SessionOptions::from(config),
                restart_delay: config.restart_delay(),
                retry_delay: config.retry_delay(),
                trail: registry.trail("RecognitionSupervisor"),
                events,
                slot: Mutex::new(SessionSlot {
                    state: SessionState::Idle,
                    desired_active: false,
                    generation: 0,
                    handle: None,
                    pump: None,
                    pending_restart: None,
                }),
            }),
        }
    }

    /// Open a session, replacing any session already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to open a session or no
    /// tokio runtime is running. The supervisor is left idle.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let mut slot = inner.lock_slot();
        slot.desired_active = true;
        slot.cancel_restart();
        inner.trail.light(
            ids::SESSION_START_REQUESTED,
            Some(json!({ "language": inner.options.language })),
        );

        match inner.open_session(&mut slot) {
            Ok(()) => {
                info!(language = %inner.options.language, "recognition session starting");
                Ok(())
            }
            Err(err) => {
                slot.desired_active = false;
                slot.state = SessionState::Idle;
                slot.handle = None;
                inner.trail.fail(ids::SESSION_START_FAILED, &err);
                Err(err.into())
            }
        }
    }

    /// Stop the session. No restart follows, even one already scheduled.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut slot = inner.lock_slot();
        slot.desired_active = false;
        slot.cancel_restart();
        slot.generation += 1;
        slot.stop_handle();
        slot.state = SessionState::Idle;
        inner.trail.light(ids::SESSION_STOPPED, None);
        info!("recognition session stopped");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lock_slot().state
    }

    /// Check if the caller wants a session running.
    #[must_use]
    pub fn is_desired_active(&self) -> bool {
        self.inner.lock_slot().desired_active
    }

    /// Receive transcripts and terminal notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for RecognitionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.lock_slot();
        f.debug_struct("RecognitionSupervisor")
            .field("state", &slot.state)
            .field("desired_active", &slot.desired_active)
            .field("generation", &slot.generation)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_session(
        self: &Arc<Self>,
        slot: &mut SessionSlot,
    ) -> std::result::Result<(), RecognitionError> {
        let runtime = Handle::try_current().map_err(|err| {
            RecognitionError::new(RecognitionErrorKind::Unavailable, err.to_string())
        })?;

        slot.stop_handle();
        slot.generation += 1;
        let generation = slot.generation;
        slot.state = SessionState::Starting;

        let (sender, receiver) = mpsc::unbounded_channel();
        slot.handle = Some(self.engine.start(&self.options, sender)?);

        slot.pump = Some(runtime.spawn(pump(Arc::downgrade(self), generation, receiver)));
        debug!(generation, "recognition session opened");
        Ok(())
    }

    /// Apply one platform event. Returns `false` once the session the event
    /// belongs to has been replaced.
    fn handle_event(self: &Arc<Self>, generation: u64, event: PlatformEvent) -> bool {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            trace!(generation, current = slot.generation, "stale session event dropped");
            return false;
        }

        match event {
            PlatformEvent::Started => {
                slot.state = SessionState::Active;
                self.trail.light(ids::SESSION_STARTED, None);
                info!(generation, "recognition session active");
            }
            PlatformEvent::Results(segments) => self.publish(&segments),
            PlatformEvent::Error(err) => {
                self.trail.fail(ids::SESSION_ERROR, &err);
                if err.kind.is_fatal() {
                    self.terminate(&mut slot, err.kind);
                } else if slot.desired_active {
                    self.schedule_restart(&mut slot, 1, self.restart_delay);
                }
            }
            PlatformEvent::Ended => {
                self.trail.light(ids::SESSION_ENDED, None);
                if slot.desired_active {
                    self.schedule_restart(&mut slot, 1, self.restart_delay);
                } else {
                    slot.handle = None;
                    slot.release_pump();
                    slot.state = SessionState::Idle;
                }
            }
        }
        true
    }

    /// Broadcast the interim text of a result callback, then its settled
    /// text, as separate transcripts.
    fn publish(&self, segments: &[Segment]) {
        let join = |is_final: bool| {
            segments
                .iter()
                .filter(|segment| segment.is_final == is_final)
                .map(|segment| segment.text.as_str())
                .collect::<String>()
        };

        for (is_final, checkpoint) in [(false, ids::INTERIM_RESULT), (true, ids::FINAL_RESULT)] {
            let text = join(is_final);
            if text.is_empty() {
                continue;
            }
            self.trail.light(checkpoint, Some(json!({ "length": text.len() })));
            // No receivers is not an error.
            let _ = self
                .events
                .send(SupervisorEvent::Transcript(TranscriptEvent::new(text, is_final)));
        }
    }

    fn terminate(&self, slot: &mut SessionSlot, kind: RecognitionErrorKind) {
        slot.desired_active = false;
        slot.cancel_restart();
        slot.generation += 1;
        slot.stop_handle();
        slot.state = SessionState::Idle;
        self.trail
            .light(ids::SESSION_TERMINATED, Some(json!({ "kind": kind })));
        info!(%kind, "recognition session terminated");
        let _ = self.events.send(SupervisorEvent::Terminated { kind });
    }

    fn schedule_restart(self: &Arc<Self>, slot: &mut SessionSlot, attempt: u32, delay: Duration) {
        if slot.pending_restart.is_some() {
            return;
        }
        slot.stop_handle();
        slot.generation += 1;
        let expected = slot.generation;
        slot.state = SessionState::Starting;

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.trail.light(
            ids::RESTART_SCHEDULED,
            Some(json!({ "attempt": attempt, "delay_ms": delay_ms })),
        );
        debug!(attempt, delay_ms, "recognition restart scheduled");

        let inner = Arc::downgrade(self);
        slot.pending_restart = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.attempt_restart(expected, attempt);
            }
        }));
    }

    fn attempt_restart(self: &Arc<Self>, expected: u64, attempt: u32) {
        let mut slot = self.lock_slot();
        if slot.generation != expected {
            return;
        }
        slot.pending_restart = None;
        if !slot.desired_active {
            return;
        }

        self.trail
            .light(ids::RESTART_ATTEMPT, Some(json!({ "attempt": attempt })));
        info!(attempt, "restarting recognition session");

        let Err(err) = self.open_session(&mut slot) else {
            return;
        };
        slot.handle = None;
        self.trail.fail(ids::RESTART_FAILED, &err);

        if attempt < MAX_RESTART_ATTEMPTS {
            self.schedule_restart(&mut slot, attempt + 1, self.retry_delay);
            return;
        }

        slot.desired_active = false;
        slot.state = SessionState::Idle;
        let exhausted = Error::RestartsExhausted {
            attempts: attempt,
            message: err.to_string(),
        };
        self.trail.fail(ids::RESTARTS_EXHAUSTED, &exhausted);
        error!(attempts = attempt, error = %err, "recognition restarts exhausted");
        let _ = self.events.send(SupervisorEvent::RestartsExhausted {
            attempts: attempt,
            message: err.to_string(),
        });
    }
}

async fn pump(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<PlatformEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.handle_event(generation, event) {
            break;
        }
    }
}
