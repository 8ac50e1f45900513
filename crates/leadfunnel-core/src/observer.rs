//! Diagnostics hooks for the gateway and the download trigger.
//!
//! Both components report what happened through an injected
//! [`FunnelObserver`] instead of writing to stdout. [`TracingObserver`] turns
//! events into structured log lines, [`FunnelMetrics`] counts them, and
//! [`ObserverSet`] fans out to several observers at once.
//!
//! Observers never see the visitor's email or phone, only lead ids and
//! error detail.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use leadfunnel_store::{Lead, LeadId, StoreError};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GatewayError;

/// Receives funnel side-effect outcomes. Every method defaults to a no-op.
pub trait FunnelObserver: Send + Sync {
    /// A lead was persisted.
    fn lead_submitted(&self, _lead: &Lead) {}

    /// A submission was rejected or failed.
    fn submission_failed(&self, _error: &GatewayError) {}

    /// The `downloaded` flag was written.
    fn download_recorded(&self, _id: &LeadId) {}

    /// The `downloaded` flag could not be written. The download still
    /// proceeds.
    fn download_record_failed(&self, _id: &LeadId, _error: &StoreError) {}

    /// The resource was handed to the visitor.
    fn download_delivered(&self, _id: &LeadId) {}
}

/// Emits one `tracing` event per outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FunnelObserver for TracingObserver {
    fn lead_submitted(&self, lead: &Lead) {
        info!(lead_id = %lead.id(), lead_source = %lead.lead_source, "lead submitted");
    }

    fn submission_failed(&self, error: &GatewayError) {
        match error {
            GatewayError::Validation(_) => {
                info!(kind = error.kind(), error = %error, "lead rejected by validation");
            }
            _ => warn!(kind = error.kind(), error = %error, "lead submission failed"),
        }
    }

    fn download_recorded(&self, id: &LeadId) {
        info!(lead_id = %id, "download recorded");
    }

    fn download_record_failed(&self, id: &LeadId, error: &StoreError) {
        warn!(lead_id = %id, error = %error, "failed to record download, delivering anyway");
    }

    fn download_delivered(&self, id: &LeadId) {
        info!(lead_id = %id, "download delivered");
    }
}

/// Monotonic counters for funnel outcomes.
#[derive(Debug, Default)]
pub struct FunnelMetrics {
    submitted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    downloads_delivered: AtomicU64,
    downloads_unrecorded: AtomicU64,
}

/// Point-in-time copy of [`FunnelMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Leads persisted.
    pub submitted: u64,
    /// Submissions stopped by validation.
    pub rejected: u64,
    /// Submissions that reached the backend and failed.
    pub failed: u64,
    /// Resources handed out.
    pub downloads_delivered: u64,
    /// Downloads whose bookkeeping write failed.
    pub downloads_unrecorded: u64,
}

impl FunnelMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            downloads_delivered: self.downloads_delivered.load(Ordering::Relaxed),
            downloads_unrecorded: self.downloads_unrecorded.load(Ordering::Relaxed),
        }
    }
}

impl FunnelObserver for FunnelMetrics {
    fn lead_submitted(&self, _lead: &Lead) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn submission_failed(&self, error: &GatewayError) {
        let counter = match error {
            GatewayError::Validation(_) => &self.rejected,
            _ => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn download_record_failed(&self, _id: &LeadId, _error: &StoreError) {
        self.downloads_unrecorded.fetch_add(1, Ordering::Relaxed);
    }

    fn download_delivered(&self, _id: &LeadId) {
        self.downloads_delivered.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forwards every event to each registered observer in order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn FunnelObserver>>,
}

impl ObserverSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, observer: Arc<dyn FunnelObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl FunnelObserver for ObserverSet {
    fn lead_submitted(&self, lead: &Lead) {
        for o in &self.observers {
            o.lead_submitted(lead);
        }
    }

    fn submission_failed(&self, error: &GatewayError) {
        for o in &self.observers {
            o.submission_failed(error);
        }
    }

    fn download_recorded(&self, id: &LeadId) {
        for o in &self.observers {
            o.download_recorded(id);
        }
    }

    fn download_record_failed(&self, id: &LeadId, error: &StoreError) {
        for o in &self.observers {
            o.download_record_failed(id, error);
        }
    }

    fn download_delivered(&self, id: &LeadId) {
        for o in &self.observers {
            o.download_delivered(id);
        }
    }
}
