//! Job and result message bodies

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::MessagingError;
use crate::handlers::{HandlerResult, Payload, ResultStatus};

/// Job id used when the message does not carry one
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// Action invoked when the message does not name one
pub const DEFAULT_ACTION: &str = "search_product";

/// Inbound unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default = "default_job_id", deserialize_with = "job_id_or_default")]
    pub job_id: String,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default = "default_action", deserialize_with = "action_or_default")]
    pub action: String,
    #[serde(default, deserialize_with = "payload_or_default")]
    pub payload: Payload,
}

fn default_job_id() -> String {
    UNKNOWN_JOB_ID.to_string()
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

fn job_id_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_job_id))
}

fn action_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_action))
}

fn payload_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Payload, D::Error> {
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

impl Job {
    pub fn new(job_id: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            site_id: Some(site_id.into()),
            action: default_action(),
            payload: Payload::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Decode a broker message body
    pub fn from_slice(body: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(body).map_err(MessagingError::Decode)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(MessagingError::Encode)
    }

    /// Target site, treating an empty identifier as missing
    pub fn site_id(&self) -> Option<&str> {
        self.site_id
            .as_deref()
            .filter(|site_id| !site_id.trim().is_empty())
    }
}

/// Outbound envelope: job identity plus the flattened handler result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub site_id: Option<String>,
    pub action: Option<String>,
    pub status: ResultStatus,
    pub data: Payload,
    pub error: Option<String>,
    pub metadata: Payload,
}

impl JobResult {
    pub fn from_handler(job: &Job, result: HandlerResult) -> Self {
        Self {
            job_id: job.job_id.clone(),
            site_id: job.site_id.clone(),
            action: Some(job.action.clone()),
            status: result.status,
            data: result.data,
            error: result.error,
            metadata: result.metadata,
        }
        .stamped()
    }

    /// Failed result produced by the dispatcher itself
    pub fn failure(job: &Job, error: impl Into<String>, data: Payload) -> Self {
        Self {
            job_id: job.job_id.clone(),
            site_id: job.site_id().map(str::to_string),
            action: Some(job.action.clone()),
            status: ResultStatus::Failed,
            data,
            error: Some(error.into()),
            metadata: Payload::new(),
        }
        .stamped()
    }

    fn stamped(mut self) -> Self {
        self.metadata.insert(
            "processed_at".to_string(),
            Value::from(Utc::now().to_rfc3339()),
        );
        self
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(MessagingError::Encode)
    }
}
