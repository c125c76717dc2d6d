use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Action arguments and result payloads are plain JSON objects
pub type Payload = Map<String, Value>;

/// Outcome taxonomy shared by handler results and published job results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
    Partial,
    /// The action exists but is deliberately not implemented yet
    Pending,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
            ResultStatus::Partial => "partial",
            ResultStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standardized outcome of one handler invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub status: ResultStatus,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Payload,
}

impl HandlerResult {
    pub fn completed(data: Payload) -> Self {
        Self {
            status: ResultStatus::Completed,
            data,
            error: None,
            metadata: Payload::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            data: Payload::new(),
            error: Some(error.into()),
            metadata: Payload::new(),
        }
    }

    pub fn partial(data: Payload, error: Option<String>) -> Self {
        Self {
            status: ResultStatus::Partial,
            data,
            error,
            metadata: Payload::new(),
        }
    }

    pub fn pending(reason: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Pending,
            data: Payload::new(),
            error: Some(reason.into()),
            metadata: Payload::new(),
        }
    }

    /// Failure returned when an action name does not resolve on a handler
    pub fn unsupported(action: &str, site_id: &str, available: Vec<String>) -> Self {
        let available = Value::from(available);
        let mut result =
            Self::failed(format!("action '{action}' not supported by '{site_id}'"));
        result
            .data
            .insert("available_actions".to_string(), available.clone());
        result
            .metadata
            .insert("available_actions".to_string(), available);
        result
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `completed` carries no error and `failed` always carries one;
    /// `partial` and `pending` may go either way.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            ResultStatus::Completed => self.error.is_none(),
            ResultStatus::Failed => self.error.is_some(),
            ResultStatus::Partial | ResultStatus::Pending => true,
        }
    }

    /// Merge timing fields into metadata, keeping every other key the handler set
    pub fn record_timing(&mut self, timing: &ExecutionTiming) {
        self.metadata.insert(
            "started_at".to_string(),
            Value::from(timing.started_at.to_rfc3339()),
        );
        self.metadata.insert(
            "completed_at".to_string(),
            Value::from(timing.completed_at.to_rfc3339()),
        );
        self.metadata
            .insert("duration_ms".to_string(), Value::from(timing.duration_ms()));
    }
}

/// Wall-clock bounds of one action invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTiming {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionTiming {
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0)
    }
}

/// Diagnostic view of one registered handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub site_id: String,
    pub implementation: String,
    pub available_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ResultStatus::Pending).unwrap(),
            json!("pending")
        );
        let status: ResultStatus = serde_json::from_value(json!("partial")).unwrap();
        assert_eq!(status, ResultStatus::Partial);
        assert!(serde_json::from_value::<ResultStatus>(json!("done")).is_err());
    }

    #[test]
    fn test_constructors_are_consistent() {
        assert!(HandlerResult::completed(Payload::new()).is_consistent());
        assert!(HandlerResult::failed("boom").is_consistent());
        assert!(HandlerResult::pending("not implemented").is_consistent());
        assert!(HandlerResult::partial(Payload::new(), None).is_consistent());

        let mut broken = HandlerResult::completed(Payload::new());
        broken.error = Some("should not be here".to_string());
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_unsupported_lists_available_actions() {
        let result =
            HandlerResult::unsupported("other", "demo", vec!["search_product".to_string()]);

        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(
            result.error.as_deref(),
            Some("action 'other' not supported by 'demo'")
        );
        assert_eq!(result.data["available_actions"], json!(["search_product"]));
        assert_eq!(result.metadata["available_actions"], json!(["search_product"]));
    }

    #[test]
    fn test_record_timing_preserves_handler_metadata() {
        let started_at = Utc::now();
        let timing = ExecutionTiming {
            started_at,
            completed_at: started_at + Duration::milliseconds(42),
        };

        let mut result = HandlerResult::completed(Payload::new())
            .with_metadata("source_url", "https://example.com/search?q=phone");
        result.record_timing(&timing);

        assert_eq!(
            result.metadata["source_url"],
            json!("https://example.com/search?q=phone")
        );
        assert_eq!(result.metadata["duration_ms"], json!(42));
        assert_eq!(
            result.metadata["started_at"],
            json!(started_at.to_rfc3339())
        );
        assert!(result.metadata.contains_key("completed_at"));
    }

    #[test]
    fn test_duration_never_negative() {
        let now = Utc::now();
        let timing = ExecutionTiming {
            started_at: now,
            completed_at: now - Duration::milliseconds(5),
        };
        assert_eq!(timing.duration_ms(), 0);
    }
}
