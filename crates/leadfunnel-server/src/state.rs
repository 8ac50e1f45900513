//! Shared application state for the `leadfunnel` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. It owns the lead store handle (through the
//! gateway and trigger), the session registry, and the counters.

use std::sync::Arc;
use std::time::Duration;

use leadfunnel_core::{
    DownloadResource, DownloadTrigger, FunnelMetrics, FunnelObserver, FunnelPolicy, ObserverSet,
    SubmissionGateway, TracingObserver,
};
use leadfunnel_store::LeadStore;

use crate::config::PageContent;
use crate::session::SessionRegistry;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Validates and persists leads.
    pub gateway: SubmissionGateway,
    /// Records downloads and names the resource.
    pub trigger: DownloadTrigger,
    /// Outcome counters exposed at `/metrics`.
    pub metrics: Arc<FunnelMetrics>,
    /// Per-visitor funnels.
    pub sessions: Arc<SessionRegistry>,
    /// Header copy.
    pub content: PageContent,
    /// Backend name, for health output.
    pub store_name: &'static str,
    /// Whether the backend had credentials at startup.
    pub store_configured: bool,
}

impl AppState {
    /// Wire the gateway, trigger and session registry around `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        policy: FunnelPolicy,
        download: DownloadResource,
        content: PageContent,
        session_ttl: Duration,
    ) -> Self {
        let metrics = Arc::new(FunnelMetrics::new());
        let observer: Arc<dyn FunnelObserver> = Arc::new(
            ObserverSet::new()
                .with(Arc::new(TracingObserver))
                .with(Arc::clone(&metrics) as Arc<dyn FunnelObserver>),
        );

        let gateway = SubmissionGateway::new(Arc::clone(&store), &policy, Arc::clone(&observer));
        let trigger = DownloadTrigger::new(Arc::clone(&store), download, observer)
            .with_timeout(policy.submit_timeout);

        Self {
            gateway,
            trigger,
            metrics,
            store_name: store.name(),
            store_configured: store.is_configured(),
            sessions: Arc::new(SessionRegistry::new(policy, session_ttl)),
            content,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store_name)
            .field("store_configured", &self.store_configured)
            .finish_non_exhaustive()
    }
}
