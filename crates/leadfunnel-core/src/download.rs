//! Download trigger: record that a lead took the resource, then hand it out.
//!
//! The bookkeeping write is best effort. Whatever the backend says, the
//! visitor gets the resource.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use leadfunnel_store::{Lead, LeadId, LeadStore, StoreError};

use crate::observer::FunnelObserver;

/// Where the downloadable resource lives. The funnel never generates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResource {
    /// The browser is sent to `url`.
    Remote { url: String, file_name: String },
    /// The server streams the file at `path` as an attachment.
    Local { path: PathBuf, file_name: String },
}

impl DownloadResource {
    /// Suggested file name for the visitor's browser.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Remote { file_name, .. } | Self::Local { file_name, .. } => file_name,
        }
    }
}

/// Result of one trigger: what to deliver and whether the download was
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub lead_id: LeadId,
    pub resource: DownloadResource,
    /// `false` when the `downloaded` flag could not be written.
    pub recorded: bool,
}

/// Marks leads as downloaded and issues [`DownloadTicket`]s.
pub struct DownloadTrigger {
    store: Arc<dyn LeadStore>,
    resource: DownloadResource,
    observer: Arc<dyn FunnelObserver>,
    timeout: Option<Duration>,
}

impl DownloadTrigger {
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        resource: DownloadResource,
        observer: Arc<dyn FunnelObserver>,
    ) -> Self {
        Self {
            store,
            resource,
            observer,
            timeout: None,
        }
    }

    /// Bound the bookkeeping write. A zero duration means unbounded.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    #[must_use]
    pub fn resource(&self) -> &DownloadResource {
        &self.resource
    }

    /// Record the download for `lead` and return the resource to deliver.
    ///
    /// Never fails: a bookkeeping error is reported to the observer and
    /// reflected in [`DownloadTicket::recorded`].
    pub async fn trigger(&self, lead: &Lead) -> DownloadTicket {
        let id = lead.id();
        let recorded = match self.mark(id).await {
            Ok(()) => {
                self.observer.download_recorded(id);
                true
            }
            Err(e) => {
                self.observer.download_record_failed(id, &e);
                false
            }
        };
        self.observer.download_delivered(id);

        DownloadTicket {
            lead_id: id.clone(),
            resource: self.resource.clone(),
            recorded,
        }
    }

    async fn mark(&self, id: &LeadId) -> Result<(), StoreError> {
        let write = self.store.mark_downloaded(id);
        match self.timeout {
            Some(after) => tokio::time::timeout(after, write)
                .await
                .map_err(|_| StoreError::Transport {
                    reason: format!("download bookkeeping timed out after {}s", after.as_secs()),
                })?,
            None => write.await,
        }
    }
}

impl std::fmt::Debug for DownloadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTrigger")
            .field("store", &self.store.name())
            .field("resource", &self.resource)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
