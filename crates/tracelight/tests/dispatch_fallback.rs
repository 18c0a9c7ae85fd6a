//! End-to-end dispatch through a runtime-attached backend slot.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use tracelight::config::DispatchConfig;
use tracelight::dispatch::{BackendSlot, NativeBackend, Operation};
use tracelight::error::NativeCallError;
use tracelight::trace::ids;
use tracelight::{AdaptiveDispatcher, FallbackProvider, TraceRegistry};

struct Flaky;

#[async_trait]
impl NativeBackend for Flaky {
    async fn invoke(&self, operation: &str, _args: &Value) -> Result<Value, NativeCallError> {
        if operation == Operation::AudioLevels.name() {
            Err(NativeCallError::new(operation, "device busy"))
        } else {
            Ok(json!({ "native": operation }))
        }
    }
}

fn dispatcher(registry: &TraceRegistry, slot: Arc<BackendSlot>) -> AdaptiveDispatcher {
    let fallback = FallbackProvider::new(registry, DispatchConfig::immediate());
    AdaptiveDispatcher::new(registry, slot, fallback)
}

#[tokio::test]
async fn backend_attached_later_is_used_by_next_call() {
    let registry = TraceRegistry::new();
    let slot = Arc::new(BackendSlot::new());
    let dispatcher = dispatcher(&registry, Arc::clone(&slot));

    assert!(!dispatcher.detect());
    let initialize = Operation::Initialize.name();
    let first = dispatcher.dispatch(initialize, Value::Null).await.unwrap();
    assert!(first.is_string());

    slot.attach(Arc::new(Flaky));
    assert!(dispatcher.detect());
    let second = dispatcher.dispatch(initialize, Value::Null).await.unwrap();
    assert_eq!(second, json!({ "native": "initialize_voicecoach" }));

    slot.detach();
    let third = dispatcher.dispatch(initialize, Value::Null).await.unwrap();
    assert!(third.is_string());

    let stats = registry.native_call_stats();
    assert_eq!(stats.native_calls, 1);
    assert_eq!(stats.native_results, 1);
    assert_eq!(stats.fallback_uses, 2);
}

#[tokio::test]
async fn native_failure_is_hidden_and_recorded() {
    let registry = TraceRegistry::new();
    let slot = Arc::new(BackendSlot::with_backend(Arc::new(Flaky)));
    let dispatcher = dispatcher(&registry, slot);

    let levels = dispatcher
        .dispatch(Operation::AudioLevels.name(), Value::Null)
        .await
        .unwrap();
    assert!(levels.get("user").is_some());

    let failures = registry.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].checkpoint_id, ids::NATIVE_FAILED);
    assert_eq!(failures[0].component, "AdaptiveDispatcher");

    let stats = registry.native_call_stats();
    assert_eq!(stats.native_calls, 1);
    assert_eq!(stats.native_results, 0);
    assert_eq!(stats.native_failures, 1);
    assert_eq!(stats.fallback_uses, 1);

    let fallback_used = registry
        .global_trail()
        .into_iter()
        .find(|event| event.checkpoint_id == ids::FALLBACK_USED)
        .unwrap();
    assert_eq!(
        fallback_used.data.unwrap()["reason"],
        json!("native_failed")
    );
}

#[tokio::test]
async fn unknown_operation_fails_after_fallback() {
    let registry = TraceRegistry::new();
    let dispatcher = dispatcher(&registry, Arc::new(BackendSlot::new()));

    let err = dispatcher
        .dispatch("does_not_exist", Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_unknown_operation());
    assert_eq!(err.to_string(), "unknown command: does_not_exist");
    assert_eq!(registry.failures().len(), 1);
}

#[tokio::test]
async fn coaching_prompt_confidence_is_capped() {
    let registry = TraceRegistry::new();
    let dispatcher = dispatcher(&registry, Arc::new(BackendSlot::new()));

    let transcript = "price ".repeat(100);
    let prompt = dispatcher
        .dispatch(
            Operation::CoachingPrompt.name(),
            json!({ "transcript": transcript }),
        )
        .await
        .unwrap();
    let confidence = prompt["confidence_score"].as_f64().unwrap();
    assert!((confidence - 0.95).abs() < 1e-9);

    let coaching = registry.coaching_stats();
    assert_eq!(coaching.prompts_generated, 1);
    assert!((coaching.average_confidence - 0.95).abs() < 1e-9);
}
