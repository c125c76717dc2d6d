//! Job dispatcher
//!
//! Bridges the broker to the handler registry. Each delivery is settled
//! exactly once:
//!
//! | Situation | Result published | Delivery |
//! |-----------|------------------|----------|
//! | Body is not a valid job | none | rejected |
//! | `site_id` missing | `failed` | acked |
//! | `site_id` unknown | `failed` + `available_sites` | acked |
//! | Handler ran (any status) | handler result | acked |
//! | Anything else went wrong | `failed` (best effort) | rejected |
//!
//! Nothing is requeued: a job that cannot be processed once is dropped and the
//! failure is visible downstream through the published result.

pub mod runner;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::handlers::{HandlerError, HandlerRegistry, Payload, ResultStatus};
use crate::messaging::{Job, JobResult, MessageBroker, MessagingError};
use crate::observability::Metrics;

pub use runner::run;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("broker error: {0}")]
    Broker(#[from] MessagingError),

    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),
}

/// Connection lifecycle of one dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Draining,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Draining => "draining",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acknowledged { status: ResultStatus },
    Rejected { result_published: bool },
}

/// Settles deliveries against a registry through a [`MessageBroker`]
pub struct JobDispatcher<B> {
    registry: Arc<HandlerRegistry>,
    broker: B,
    metrics: Arc<Metrics>,
}

impl<B: MessageBroker> JobDispatcher<B> {
    pub fn new(registry: Arc<HandlerRegistry>, broker: B, metrics: Arc<Metrics>) -> Self {
        Self {
            registry,
            broker,
            metrics,
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn into_broker(self) -> B {
        self.broker
    }

    /// Process one delivery end to end and settle it
    ///
    /// Returns `Err` only when the final ack/reject could not be sent.
    pub async fn handle_delivery(
        &self,
        delivery_tag: u64,
        body: &[u8],
    ) -> Result<Disposition, DispatchError> {
        self.metrics.job_received();

        let job = match Job::from_slice(body) {
            Ok(job) => job,
            Err(err) => {
                warn!(delivery_tag, error = %err, "Rejecting malformed job message");
                self.broker.reject(delivery_tag).await?;
                self.metrics.message_rejected();
                return Ok(Disposition::Rejected {
                    result_published: false,
                });
            }
        };

        info!(
            delivery_tag,
            job_id = %job.job_id,
            site_id = job.site_id().unwrap_or_default(),
            action = %job.action,
            "Processing job"
        );

        match self.settle(delivery_tag, &job).await {
            Ok(status) => {
                info!(job_id = %job.job_id, %status, "Job acknowledged");
                Ok(Disposition::Acknowledged { status })
            }
            Err(err) => {
                error!(
                    delivery_tag,
                    job_id = %job.job_id,
                    error = %err,
                    "Unexpected failure while dispatching job, dropping message"
                );

                let failure = JobResult::failure(&job, err.to_string(), Payload::new());
                let result_published = match self.publish(&failure).await {
                    Ok(()) => true,
                    Err(publish_err) => {
                        error!(
                            job_id = %job.job_id,
                            error = %publish_err,
                            "Could not publish failure result"
                        );
                        false
                    }
                };

                self.broker.reject(delivery_tag).await?;
                self.metrics.message_rejected();
                Ok(Disposition::Rejected { result_published })
            }
        }
    }

    async fn settle(&self, delivery_tag: u64, job: &Job) -> Result<ResultStatus, DispatchError> {
        let result = self.dispatch(job).await?;
        self.publish(&result).await?;
        self.broker.ack(delivery_tag).await?;

        self.metrics.job_acknowledged(result.status);
        Ok(result.status)
    }

    /// Route a job to its handler and build the outbound result
    ///
    /// Validation and lookup failures become `failed` results; only handler
    /// construction errors come back as `Err`.
    pub async fn dispatch(&self, job: &Job) -> Result<JobResult, DispatchError> {
        let Some(site_id) = job.site_id() else {
            return Ok(JobResult::failure(job, "site_id is required", Payload::new()));
        };

        let Some(handler) = self.registry.get(site_id)? else {
            warn!(job_id = %job.job_id, site_id, "No handler registered for site");
            let mut data = Payload::new();
            data.insert(
                "available_sites".to_string(),
                Value::from(self.registry.list_ids()),
            );
            return Ok(JobResult::failure(
                job,
                format!("no handler registered for site_id '{site_id}'"),
                data,
            ));
        };

        let result = handler.execute(&job.action, job.payload.clone()).await;
        Ok(JobResult::from_handler(job, result))
    }

    async fn publish(&self, result: &JobResult) -> Result<(), MessagingError> {
        self.broker.publish_result(result).await?;
        self.metrics.result_published();
        Ok(())
    }
}
