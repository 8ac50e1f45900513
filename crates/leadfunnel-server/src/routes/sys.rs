//! System routes: `/healthz` and `/metrics`.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Build the system router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub store_configured: bool,
    pub sessions: usize,
}

/// Liveness. Always 200; a missing backend shows up as
/// `store_configured: false` rather than a failed probe.
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: state.store_name,
        store_configured: state.store_configured,
        sessions: state.sessions.len().await,
    })
}

/// Prometheus text exposition of the funnel counters.
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = state.metrics.snapshot();
    let sessions = state.sessions.len().await;

    let mut body = String::with_capacity(1024);
    for (name, help, value) in [
        ("leadfunnel_leads_submitted_total", "Leads persisted.", snap.submitted),
        ("leadfunnel_leads_rejected_total", "Submissions stopped by validation.", snap.rejected),
        ("leadfunnel_leads_failed_total", "Submissions that failed at the backend.", snap.failed),
        ("leadfunnel_downloads_delivered_total", "Resources handed out.", snap.downloads_delivered),
        (
            "leadfunnel_downloads_unrecorded_total",
            "Downloads whose bookkeeping write failed.",
            snap.downloads_unrecorded,
        ),
    ] {
        let _ = writeln!(body, "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}");
    }
    let _ = writeln!(
        body,
        "# HELP leadfunnel_sessions Live visitor sessions.\n# TYPE leadfunnel_sessions gauge\nleadfunnel_sessions {sessions}"
    );

    ([(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body)
}
