//! Dispatcher counters
//!
//! Plain atomics, exposed through [`Metrics::snapshot`] on the operator API.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::handlers::ResultStatus;

#[derive(Debug, Default)]
pub struct Metrics {
    jobs_received: AtomicU64,
    jobs_acknowledged: AtomicU64,
    jobs_failed: AtomicU64,
    messages_rejected: AtomicU64,
    results_published: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_received(&self) {
        self.jobs_received.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_received", "Metric incremented");
    }

    /// Count an acked delivery; `failed` results also bump `jobs_failed`
    pub fn job_acknowledged(&self, status: ResultStatus) {
        self.jobs_acknowledged.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_acknowledged", %status, "Metric incremented");

        if status == ResultStatus::Failed {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = "jobs_failed", "Metric incremented");
        }
    }

    pub fn message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "messages_rejected", "Metric incremented");
    }

    pub fn result_published(&self) {
        self.results_published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "results_published", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_received: self.jobs_received.load(Ordering::Relaxed),
            jobs_acknowledged: self.jobs_acknowledged.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            results_published: self.results_published.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_received: u64,
    pub jobs_acknowledged: u64,
    pub jobs_failed: u64,
    pub messages_rejected: u64,
    pub results_published: u64,
}
