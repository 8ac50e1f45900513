//! Funnel page routes: `/`, `/basic`, `/contact`, `/back`.
//!
//! Every post edits the visitor's funnel and redirects back to `/`, which
//! renders whatever step the funnel is in along with any pending notices.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, State};
use axum::http::HeaderMap;
use axum::response::{Html, Response};
use axum::routing::{get, post};
use leadfunnel_core::{FlowVariant, FormInput, Funnel, Notice};
use leadfunnel_store::LeadDraft;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::{back_to_page, with_session_cookie};
use crate::render;
use crate::session::{SessionId, session_from_headers};
use crate::state::AppState;

/// Build the funnel page router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(show_page))
        .route("/basic", post(submit_basic))
        .route("/contact", post(submit_contact))
        .route("/back", post(go_back))
}

// ── Request types ────────────────────────────────────────────────────

/// Fields posted by either step. An unchecked checkbox is simply absent.
#[derive(Debug, Default, Deserialize)]
pub struct StepForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent: Option<String>,
}

impl StepForm {
    fn basic(self) -> FormInput {
        FormInput {
            name: Some(self.name.unwrap_or_default()),
            email: Some(self.email.unwrap_or_default()),
            ..FormInput::default()
        }
    }

    fn contact(self) -> FormInput {
        FormInput {
            phone: Some(self.phone.unwrap_or_default()),
            consent: Some(self.consent.is_some()),
            ..FormInput::default()
        }
    }

    fn everything(self) -> FormInput {
        FormInput {
            consent: Some(self.consent.is_some()),
            phone: Some(self.phone.unwrap_or_default()),
            name: Some(self.name.unwrap_or_default()),
            email: Some(self.email.unwrap_or_default()),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Render the current step and drain pending notices.
async fn show_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, created) = state.sessions.resolve(session_from_headers(&headers)).await;
    let content = &state.content;

    let html = state
        .sessions
        .with(&id, |funnel| {
            let notices: Vec<Notice> = std::iter::from_fn(|| funnel.take_notice()).collect();
            render::page(funnel, content, &notices)
        })
        .await
        .unwrap_or_else(|| {
            render::page(&Funnel::new(state.sessions.policy()), content, &[])
        });

    with_session_cookie(Html(html), &id, created)
}

/// Apply name and email, then continue. Under the collapsed flow this form
/// carries every field and submits.
async fn submit_basic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StepForm>,
) -> Response {
    let (id, created) = state.sessions.resolve(session_from_headers(&headers)).await;
    let collapsed = state.sessions.policy().flow == FlowVariant::Collapsed;
    let input = if collapsed { form.everything() } else { form.basic() };

    let draft = state
        .sessions
        .with(&id, |funnel| {
            if let Err(e) = funnel.apply(input) {
                debug!(error = %e, "ignoring basic info post");
                return None;
            }
            if collapsed {
                return begin_submit(funnel);
            }
            if let Err(e) = funnel.advance() {
                debug!(error = %e, "basic info not accepted");
            }
            None
        })
        .await
        .flatten();

    if let Some(draft) = draft {
        finish_submit(&state, &id, draft).await;
    }
    back_to_page(&id, created)
}

/// Apply phone and consent, then submit.
async fn submit_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StepForm>,
) -> Response {
    let (id, created) = state.sessions.resolve(session_from_headers(&headers)).await;

    let draft = state
        .sessions
        .with(&id, |funnel| {
            if let Err(e) = funnel.apply(form.contact()) {
                debug!(error = %e, "ignoring contact post");
                return None;
            }
            begin_submit(funnel)
        })
        .await
        .flatten();

    if let Some(draft) = draft {
        finish_submit(&state, &id, draft).await;
    }
    back_to_page(&id, created)
}

/// Return to the first step.
async fn go_back(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, created) = state.sessions.resolve(session_from_headers(&headers)).await;
    if let Some(Err(e)) = state.sessions.with(&id, Funnel::back).await {
        debug!(error = %e, "back not available");
    }
    back_to_page(&id, created)
}

fn begin_submit(funnel: &mut Funnel) -> Option<LeadDraft> {
    funnel
        .begin_submit()
        .map_err(|e| debug!(error = %e, "submission not started"))
        .ok()
}

/// Send `draft` with the session lock released, then apply the result.
///
/// The round-trip and the write-back run on their own task, so a client
/// that disconnects mid-submit still leaves its funnel editable.
async fn finish_submit(state: &Arc<AppState>, id: &SessionId, draft: LeadDraft) {
    let task_state = Arc::clone(state);
    let task_id = id.clone();
    let handle = tokio::spawn(async move {
        let result = task_state.gateway.submit(draft).await;
        task_state
            .sessions
            .with(&task_id, |funnel| {
                funnel
                    .complete_submit(result)
                    .map(|lead| lead.id().clone())
            })
            .await
    });

    match handle.await {
        Ok(Some(Ok(lead_id))) => debug!(lead_id = %lead_id, "funnel completed"),
        Ok(Some(Err(e))) => debug!(error = %e, "funnel returned to editing"),
        Ok(None) => warn!("session expired while its submission was in flight"),
        Err(e) => error!(error = %e, "submission task failed"),
    }
}
