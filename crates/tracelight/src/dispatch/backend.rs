//! The native backend seam and its availability capability.
//!
//! The dispatcher never inspects the environment on its own. It asks an
//! injected [`BackendAvailability`] on every call, so a bridge that attaches
//! after startup is picked up by the next dispatch.

use std::sync::{Arc, RwLock, PoisonError};

use serde_json::Value;

use crate::error::NativeCallError;

/// A native implementation of the operation catalog.
#[async_trait::async_trait]
pub trait NativeBackend: Send + Sync {
    /// Invoke `operation` with `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the call. The dispatcher
    /// records it and retries the call through the fallback catalog.
    async fn invoke(&self, operation: &str, args: &Value) -> Result<Value, NativeCallError>;
}

/// Reports whether a native backend is reachable right now.
pub trait BackendAvailability: Send + Sync {
    /// The backend to call, if one is present.
    fn backend(&self) -> Option<Arc<dyn NativeBackend>>;

    /// Check if a backend is present.
    fn detect(&self) -> bool {
        self.backend().is_some()
    }
}

/// Availability that never finds a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackend;

impl BackendAvailability for NoBackend {
    fn backend(&self) -> Option<Arc<dyn NativeBackend>> {
        None
    }
}

/// A slot a native bridge can attach to and detach from at runtime.
#[derive(Default)]
pub struct BackendSlot {
    inner: RwLock<Option<Arc<dyn NativeBackend>>>,
}

impl BackendSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot with `backend` already attached.
    #[must_use]
    pub fn with_backend(backend: Arc<dyn NativeBackend>) -> Self {
        Self {
            inner: RwLock::new(Some(backend)),
        }
    }

    /// Attach a backend, replacing any previous one.
    pub fn attach(&self, backend: Arc<dyn NativeBackend>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(backend);
    }

    /// Detach the current backend, if any.
    pub fn detach(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl BackendAvailability for BackendSlot {
    fn backend(&self) -> Option<Arc<dyn NativeBackend>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for BackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSlot")
            .field("attached", &self.detect())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl NativeBackend for Echo {
        async fn invoke(&self, operation: &str, _args: &Value) -> Result<Value, NativeCallError> {
            Ok(Value::String(operation.to_string()))
        }
    }

    #[test]
    fn test_no_backend() {
        assert!(!NoBackend.detect());
        assert!(NoBackend.backend().is_none());
    }

    #[test]
    fn test_slot_attach_detach() {
        let slot = BackendSlot::new();
        assert!(!slot.detect());

        slot.attach(Arc::new(Echo));
        assert!(slot.detect());

        slot.detach();
        assert!(!slot.detect());
    }

    #[tokio::test]
    async fn test_slot_hands_out_attached_backend() {
        let slot = BackendSlot::with_backend(Arc::new(Echo));
        let backend = slot.backend().unwrap();
        let result = backend.invoke("ping", &Value::Null).await.unwrap();
        assert_eq!(result, Value::String("ping".into()));
        assert!(format!("{slot:?}").contains("attached: true"));
    }
}
