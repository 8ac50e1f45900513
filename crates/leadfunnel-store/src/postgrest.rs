//! Hosted PostgREST lead store (Supabase and compatible).
//!
//! Speaks the plain REST dialect PostgREST exposes under `/rest/v1`:
//!
//! - insert: `POST /rest/v1/{table}` with `Prefer: return=representation`,
//!   answered by a JSON array of the inserted rows
//! - update: `PATCH /rest/v1/{table}?id=eq.{id}` with `Prefer: return=minimal`
//!
//! The public (anon) API key is sent both as `apikey` and as a bearer token,
//! which is what the hosted gateway expects. Row-level security and
//! authentication stay on the backend's side.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use crate::{Lead, LeadId, LeadStore, NewLead, StoreError};

const DEFAULT_TABLE: &str = "leads";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for [`PostgrestStore`].
#[derive(Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`.
    pub url: Option<String>,
    /// Public (anon) API key.
    pub api_key: Option<String>,
    /// Table holding leads. Default: `leads`.
    pub table: String,
    /// Per-request timeout of the HTTP client. Default: 10 seconds.
    pub timeout: Duration,
}

impl Default for PostgrestConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: DEFAULT_TABLE.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for PostgrestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
struct Endpoint {
    table_url: String,
    api_key: String,
}

/// Lead store backed by a hosted PostgREST endpoint.
#[derive(Debug)]
pub struct PostgrestStore {
    endpoint: Option<Endpoint>,
    missing: Vec<&'static str>,
    client: reqwest::Client,
}

impl PostgrestStore {
    /// Build a store from connection parameters.
    ///
    /// Missing `url` or `api_key` does not fail construction: the store is
    /// created unconfigured and every call returns
    /// [`StoreError::NotConfigured`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if the HTTP client cannot be built
    /// (for example, no TLS backend is available).
    pub fn new(config: PostgrestConfig) -> Result<Self, StoreError> {
        let url = non_empty(config.url);
        let api_key = non_empty(config.api_key);

        let mut missing = Vec::new();
        if url.is_none() {
            missing.push("backend url");
        }
        if api_key.is_none() {
            missing.push("api key");
        }

        let table = if config.table.trim().is_empty() {
            DEFAULT_TABLE.to_owned()
        } else {
            config.table
        };

        let endpoint = match (url, api_key) {
            (Some(url), Some(api_key)) => Some(Endpoint {
                table_url: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
                api_key,
            }),
            _ => None,
        };

        let timeout = if config.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            config.timeout
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("leadfunnel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            endpoint,
            missing,
            client,
        })
    }

    /// Connection parameters that were absent at construction.
    #[must_use]
    pub fn missing(&self) -> &[&'static str] {
        &self.missing
    }

    fn endpoint(&self) -> Result<&Endpoint, StoreError> {
        self.endpoint.as_ref().ok_or_else(|| StoreError::NotConfigured {
            missing: self.missing.join(" and "),
        })
    }

    fn headers(endpoint: &Endpoint, prefer: &'static str) -> Result<HeaderMap, StoreError> {
        let key = HeaderValue::from_str(&endpoint.api_key).map_err(|_| {
            StoreError::NotConfigured {
                missing: "a valid api key".to_owned(),
            }
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", endpoint.api_key)).map_err(
            |_| StoreError::NotConfigured {
                missing: "a valid api key".to_owned(),
            },
        )?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);
        headers.insert("Prefer", HeaderValue::from_static(prefer));
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl LeadStore for PostgrestStore {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn insert(&self, lead: &NewLead) -> Result<Vec<Lead>, StoreError> {
        let endpoint = self.endpoint()?;

        let resp = self
            .client
            .post(&endpoint.table_url)
            .headers(Self::headers(endpoint, "return=representation")?)
            .json(lead)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(backend_error(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Lead> = serde_json::from_str(&text)?;
        debug!(rows = rows.len(), "lead insert answered");
        Ok(rows)
    }

    async fn mark_downloaded(&self, id: &LeadId) -> Result<(), StoreError> {
        let endpoint = self.endpoint()?;

        let resp = self
            .client
            .patch(&endpoint.table_url)
            .headers(Self::headers(endpoint, "return=minimal")?)
            .query(&[("id", format!("eq.{id}"))])
            .json(&serde_json::json!({ "downloaded": true }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        Err(backend_error(status.as_u16(), &text))
    }
}

/// PostgREST error body.
#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    code: Option<String>,
}

fn backend_error(status: u16, body: &str) -> StoreError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| match (b.code, b.message) {
            (Some(code), Some(msg)) => Some(format!("{msg} ({code})")),
            (None, Some(msg)) => Some(msg),
            _ => None,
        })
        .unwrap_or_else(|| format!("HTTP {status}"));
    StoreError::Backend { status, message }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}
