//! HTTP route handlers for the `leadfunnel` server.

pub mod download;
pub mod funnel;
pub mod sys;

use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Redirect, Response};

use crate::session::{SessionId, session_cookie};

/// Attach the session cookie when the session was just created.
pub(crate) fn with_session_cookie(
    response: impl IntoResponse,
    id: &SessionId,
    created: bool,
) -> Response {
    let mut response = response.into_response();
    if created {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(id)) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// POST/redirect/GET back to the page.
pub(crate) fn back_to_page(id: &SessionId, created: bool) -> Response {
    with_session_cookie(Redirect::to("/"), id, created)
}
