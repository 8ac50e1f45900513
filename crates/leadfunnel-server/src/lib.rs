//! `leadfunnel` HTTP server.
//!
//! Wires the core library, the lead store, and the HTTP routes into a
//! running Axum server. Serves the server-rendered funnel at `/` plus
//! `/healthz` and `/metrics`.

pub mod config;
pub mod error;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Upper bound on funnel requests handled at once.
const MAX_CONCURRENT_FUNNEL_REQUESTS: usize = 256;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let funnel_routes = Router::new()
        .merge(routes::funnel::router())
        .merge(routes::download::router())
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            MAX_CONCURRENT_FUNNEL_REQUESTS,
        ));

    Router::new()
        .merge(funnel_routes)
        .merge(routes::sys::router())
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
