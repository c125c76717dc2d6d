//! Broker abstraction
//!
//! The dispatcher only needs three broker operations per delivery: publish a
//! result, acknowledge, or reject without requeue. [`RabbitMqBroker`] is the
//! production implementation; [`RecordingBroker`] keeps everything in memory
//! for tests and dry runs.

mod job;
pub mod rabbitmq;

pub use job::{DEFAULT_ACTION, Job, JobResult, UNKNOWN_JOB_ID};
pub use rabbitmq::RabbitMqBroker;

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Topology declaration failed: {0}")]
    Topology(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Ack failed for delivery {delivery_tag}: {reason}")]
    Ack { delivery_tag: u64, reason: String },

    #[error("Reject failed for delivery {delivery_tag}: {reason}")]
    Reject { delivery_tag: u64, reason: String },

    #[error("Malformed job message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MessagingError>;

/// Broker operations used while settling one delivery
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a result to the results exchange
    async fn publish_result(&self, result: &JobResult) -> Result<()>;

    /// Acknowledge a delivery
    async fn ack(&self, delivery_tag: u64) -> Result<()>;

    /// Reject a delivery without requeue
    async fn reject(&self, delivery_tag: u64) -> Result<()>;
}

/// In-memory broker that records every operation
#[derive(Debug, Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<JobResult>>,
    acked: Mutex<Vec<u64>>,
    rejected: Mutex<Vec<u64>>,
    fail_publish: AtomicBool,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail, as a dropped broker channel would
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<JobResult> {
        lock(&self.published).clone()
    }

    pub fn acked(&self) -> Vec<u64> {
        lock(&self.acked).clone()
    }

    pub fn rejected(&self) -> Vec<u64> {
        lock(&self.rejected).clone()
    }
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn publish_result(&self, result: &JobResult) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(MessagingError::PublishFailed("channel closed".to_string()));
        }
        // Same encoding path as the real broker
        result.to_vec()?;
        tracing::debug!(job_id = %result.job_id, status = %result.status, "Recorded result");
        lock(&self.published).push(result.clone());
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        lock(&self.acked).push(delivery_tag);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64) -> Result<()> {
        lock(&self.rejected).push(delivery_tag);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
