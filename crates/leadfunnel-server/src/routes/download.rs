//! Download route: `/download`.
//!
//! Records the download (best effort) and hands out the resource, either by
//! redirecting to its URL or by serving the configured file as an
//! attachment.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use leadfunnel_core::{DownloadResource, Funnel};
use tracing::{debug, error};

use super::{back_to_page, with_session_cookie};
use crate::error::AppError;
use crate::session::session_from_headers;
use crate::state::AppState;

/// Build the download router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download", post(download))
}

async fn download(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (id, created) = state.sessions.resolve(session_from_headers(&headers)).await;

    let lead = match state.sessions.with(&id, Funnel::begin_download).await {
        Some(Ok(lead)) => lead,
        Some(Err(e)) => {
            debug!(error = %e, "download not available");
            return Ok(back_to_page(&id, created));
        }
        None => return Ok(back_to_page(&id, created)),
    };

    // Recording and the write-back outlive a disconnected client, so the
    // in-flight flag is always cleared.
    let task_state = Arc::clone(&state);
    let task_id = id.clone();
    let ticket = tokio::spawn(async move {
        let ticket = task_state.trigger.trigger(&lead).await;
        task_state
            .sessions
            .with(&task_id, |funnel| funnel.finish_download(ticket.recorded))
            .await;
        ticket
    })
    .await
    .map_err(|e| {
        error!(error = %e, "download task failed");
        AppError::Internal("the download is temporarily unavailable".to_owned())
    })?;

    let response = deliver(&ticket.resource).await?;
    Ok(with_session_cookie(response, &id, created))
}

async fn deliver(resource: &DownloadResource) -> Result<Response, AppError> {
    match resource {
        DownloadResource::Remote { url, .. } => Ok(Redirect::to(url).into_response()),
        DownloadResource::Local { path, file_name } => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                error!(path = %path.display(), error = %e, "failed to read download resource");
                AppError::Internal("the download is temporarily unavailable".to_owned())
            })?;

            let disposition = format!("attachment; filename=\"{}\"", safe_file_name(file_name));
            let disposition = HeaderValue::from_str(&disposition)
                .map_err(|e| AppError::Internal(format!("invalid download file name: {e}")))?;

            Ok((
                [
                    (CONTENT_TYPE, HeaderValue::from_static(content_type_for(file_name))),
                    (CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response())
        }
    }
}

/// Keep the suggested name inside a quoted header parameter.
fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("epub") => "application/epub+zip",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
