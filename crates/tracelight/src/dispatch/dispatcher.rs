//! The adaptive dispatcher.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::backend::BackendAvailability;
use super::fallback::FallbackProvider;
use crate::error::Result;
use crate::trace::{ids, TraceRegistry, Trail};

/// Routes operation calls to a native backend when one is present and to
/// the fallback catalog otherwise.
///
/// A native failure is recorded and the call is retried once through the
/// fallback catalog; the caller never sees it. A fallback failure is final
/// and propagates.
pub struct AdaptiveDispatcher {
    availability: Arc<dyn BackendAvailability>,
    fallback: FallbackProvider,
    trail: Trail,
}

impl AdaptiveDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        registry: &TraceRegistry,
        availability: Arc<dyn BackendAvailability>,
        fallback: FallbackProvider,
    ) -> Self {
        Self {
            availability,
            fallback,
            trail: registry.trail("AdaptiveDispatcher"),
        }
    }

    /// Check, right now, whether a native backend is present.
    #[must_use]
    pub fn detect(&self) -> bool {
        self.availability.detect()
    }

    /// The fallback catalog this dispatcher falls back to.
    #[must_use]
    pub fn fallback(&self) -> &FallbackProvider {
        &self.fallback
    }

    /// Run `operation` with `args`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the fallback catalog fails, which happens
    /// for operations it does not know.
    pub async fn dispatch(&self, operation: &str, args: Value) -> Result<Value> {
        let reason = match self.availability.backend() {
            Some(backend) => {
                self.trail
                    .light(ids::NATIVE_CALL, Some(json!({ "operation": operation })));
                match backend.invoke(operation, &args).await {
                    Ok(result) => {
                        self.trail
                            .light(ids::NATIVE_RESULT, Some(json!({ "operation": operation })));
                        debug!(operation, "native call served");
                        return Ok(result);
                    }
                    Err(err) => {
                        self.trail.fail(ids::NATIVE_FAILED, &err);
                        warn!(operation, error = %err, "native call failed, using fallback");
                        "native_failed"
                    }
                }
            }
            None => "no_backend",
        };

        self.trail.light(
            ids::FALLBACK_USED,
            Some(json!({ "operation": operation, "reason": reason })),
        );
        self.fallback.invoke(operation, &args).await
    }
}

impl std::fmt::Debug for AdaptiveDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveDispatcher")
            .field("native_available", &self.detect())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
