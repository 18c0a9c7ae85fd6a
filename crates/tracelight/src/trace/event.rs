//! The trace event record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checkpoint::{checkpoint_name, Category};

/// Failure details captured by [`super::Trail::fail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceError {
    /// The error's display message.
    pub message: String,
    /// The error's debug rendering, including its source chain.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

impl TraceError {
    /// Capture an error's message and debug rendering.
    #[must_use]
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self {
            message: error.to_string(),
            stack: Some(format!("{error:?}")),
        }
    }
}

/// One checkpoint, recorded as a success or a failure.
///
/// Events are values: trails, the merged stream and the failure stream each
/// hold their own copy, and every accessor hands out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Caller-assigned checkpoint id.
    pub checkpoint_id: u32,
    /// Name resolved from the checkpoint id.
    pub name: String,
    /// The component whose trail recorded the event.
    pub component: String,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Whether the checkpoint was a success.
    pub success: bool,
    /// Payload attached to successes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
    /// Details attached to failures.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<TraceError>,
}

impl TraceEvent {
    /// Build a success event.
    #[must_use]
    pub fn success(
        component: impl Into<String>,
        checkpoint_id: u32,
        data: Option<Value>,
        timestamp: i64,
    ) -> Self {
        Self {
            checkpoint_id,
            name: checkpoint_name(checkpoint_id),
            component: component.into(),
            timestamp,
            success: true,
            data,
            error: None,
        }
    }

    /// Build a failure event.
    #[must_use]
    pub fn failure(
        component: impl Into<String>,
        checkpoint_id: u32,
        error: TraceError,
        timestamp: i64,
    ) -> Self {
        Self {
            checkpoint_id,
            name: checkpoint_name(checkpoint_id),
            component: component.into(),
            timestamp,
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// The category owning this event's checkpoint id.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        Category::of(self.checkpoint_id)
    }

    /// Check if this event records a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// Read a numeric payload field.
    #[must_use]
    pub fn data_f64(&self, field: &str) -> Option<f64> {
        self.data.as_ref()?.get(field)?.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_event() {
        let event = TraceEvent::success("Audio", 501, Some(json!({"k": 1})), 10);
        assert!(event.success);
        assert!(!event.is_failure());
        assert_eq!(event.name, "SESSION_STARTED");
        assert_eq!(event.category(), Some(Category::AudioProcessing));
        assert!(event.error.is_none());
    }

    #[test]
    fn test_failure_event() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let event = TraceEvent::failure("Store", 42, TraceError::from_error(&io), 10);
        assert!(event.is_failure());
        assert!(event.data.is_none());
        assert_eq!(event.name, "LED_42");
        assert_eq!(event.category(), None);

        let error = event.error.unwrap();
        assert_eq!(error.message, "disk on fire");
        assert!(error.stack.unwrap().contains("disk on fire"));
    }

    #[test]
    fn test_data_f64() {
        let event = TraceEvent::success("C", 220, Some(json!({"score": 0.5, "label": "x"})), 0);
        assert_eq!(event.data_f64("score"), Some(0.5));
        assert_eq!(event.data_f64("label"), None);
        assert_eq!(event.data_f64("missing"), None);

        let bare = TraceEvent::success("C", 220, None, 0);
        assert_eq!(bare.data_f64("score"), None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let event = TraceEvent::success("Dispatcher", 201, None, 7);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["checkpointId"], 201);
        assert_eq!(json["component"], "Dispatcher");
        assert!(json.get("data").is_none());
        assert!(json.get("error").is_none());
    }
}
