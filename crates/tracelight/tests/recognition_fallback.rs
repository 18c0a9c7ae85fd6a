//! The fallback catalog driving a recognition supervisor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use tracelight::config::{DispatchConfig, RecognitionConfig};
use tracelight::dispatch::{NoBackend, Operation};
use tracelight::error::RecognitionError;
use tracelight::recognition::{
    PlatformEvent, PlatformEventSender, RecognitionEngine, RecognitionHandle, Segment,
    SessionOptions, SessionState, SupervisorEvent, UnavailableEngine,
};
use tracelight::{AdaptiveDispatcher, FallbackProvider, RecognitionSupervisor, TraceRegistry};

#[derive(Default)]
struct LoopbackEngine {
    sender: Mutex<Option<PlatformEventSender>>,
}

struct LoopbackHandle;

impl RecognitionHandle for LoopbackHandle {
    fn stop(&mut self) {}
}

impl RecognitionEngine for LoopbackEngine {
    fn start(
        &self,
        _options: &SessionOptions,
        events: PlatformEventSender,
    ) -> Result<Box<dyn RecognitionHandle>, RecognitionError> {
        *self.sender.lock().unwrap() = Some(events);
        Ok(Box::new(LoopbackHandle))
    }
}

impl LoopbackEngine {
    fn emit(&self, event: PlatformEvent) {
        let sender = self.sender.lock().unwrap();
        if let Some(sender) = sender.as_ref() {
            let _ = sender.send(event);
        }
    }
}

fn dispatcher_with(
    registry: &TraceRegistry,
    engine: Arc<dyn RecognitionEngine>,
) -> (AdaptiveDispatcher, RecognitionSupervisor) {
    let supervisor = RecognitionSupervisor::new(engine, &RecognitionConfig::default(), registry);
    let fallback = FallbackProvider::new(registry, DispatchConfig::immediate())
        .with_supervisor(supervisor.clone());
    (
        AdaptiveDispatcher::new(registry, Arc::new(NoBackend), fallback),
        supervisor,
    )
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn recording_round_trip_through_dispatcher() {
    let registry = TraceRegistry::new();
    let engine = Arc::new(LoopbackEngine::default());
    let (dispatcher, supervisor) = dispatcher_with(&registry, engine.clone());
    let mut transcripts = supervisor.subscribe();

    dispatcher
        .dispatch(Operation::StartRecording.name(), Value::Null)
        .await
        .unwrap();
    engine.emit(PlatformEvent::Started);
    settle().await;
    assert_eq!(supervisor.state(), SessionState::Active);

    let status = dispatcher
        .dispatch(Operation::AudioStatus.name(), Value::Null)
        .await
        .unwrap();
    assert_eq!(status["is_recording"], json!(true));
    assert_eq!(status["state"], json!("active"));

    engine.emit(PlatformEvent::Results(vec![Segment::final_text(
        "what does it cost",
    )]));
    settle().await;
    let Ok(SupervisorEvent::Transcript(transcript)) = transcripts.recv().await else {
        panic!("expected a transcript");
    };
    assert_eq!(transcript.text, "what does it cost");
    assert!(transcript.is_final);

    dispatcher
        .dispatch(Operation::StopRecording.name(), Value::Null)
        .await
        .unwrap();
    engine.emit(PlatformEvent::Ended);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(supervisor.state(), SessionState::Idle);
    assert!(!supervisor.is_desired_active());
    let audio = registry.audio_mode_stats();
    assert_eq!(audio.session_starts, 1);
    assert_eq!(audio.restarts, 0);
    assert_eq!(audio.stops, 1);
    assert_eq!(audio.final_results, 1);
}

#[tokio::test]
async fn unavailable_recognition_still_reports_started() {
    let registry = TraceRegistry::new();
    let (dispatcher, supervisor) = dispatcher_with(&registry, Arc::new(UnavailableEngine));

    let started = dispatcher
        .dispatch(Operation::StartRecording.name(), Value::Null)
        .await
        .unwrap();
    assert!(started.is_string());
    assert_eq!(supervisor.state(), SessionState::Idle);
    assert_eq!(registry.audio_mode_stats().errors, 1);
}
