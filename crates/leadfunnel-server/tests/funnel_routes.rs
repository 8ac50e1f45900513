//! End-to-end tests for the `leadfunnel` HTTP routes.
//!
//! Each test builds the full router around an in-memory (or scripted) lead
//! store and drives it request by request with `tower::ServiceExt::oneshot`,
//! carrying the session cookie the way a browser would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use tokio::sync::Notify;
use tower::ServiceExt;

use leadfunnel_core::{DownloadResource, FlowVariant, FunnelPolicy};
use leadfunnel_server::build_router;
use leadfunnel_server::config::PageContent;
use leadfunnel_server::state::AppState;
use leadfunnel_store::{Lead, LeadId, LeadStore, MemoryStore, NewLead, StoreError};

const GUIDE_URL: &str = "https://cdn.example.com/guides/free-guide.pdf";

// ── Harness ──────────────────────────────────────────────────────────

fn remote_guide() -> DownloadResource {
    DownloadResource::Remote {
        url: GUIDE_URL.to_owned(),
        file_name: "free-guide.pdf".to_owned(),
    }
}

fn app_with(store: Arc<dyn LeadStore>, policy: FunnelPolicy, download: DownloadResource) -> Router {
    let state = AppState::new(
        store,
        policy,
        download,
        PageContent::default(),
        Duration::from_secs(3600),
    );
    build_router(Arc::new(state))
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Reply {
    fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

/// A browser stand-in that remembers its session cookie.
struct Visitor {
    app: Router,
    cookie: Option<String>,
}

impl Visitor {
    fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    async fn send(&mut self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set) = response.headers().get(SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Reply {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder
    }

    async fn get(&mut self, uri: &str) -> Reply {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Reply {
        let request = self
            .request("POST", uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_owned()))
            .unwrap();
        self.send(request).await
    }

    /// Post, then give up after a second the way a closing browser tab
    /// does. The request must still be in flight when it is dropped.
    async fn abandon(&mut self, uri: &str, form: &str) {
        let request = self
            .request("POST", uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_owned()))
            .unwrap();
        let outcome =
            tokio::time::timeout(Duration::from_secs(1), self.app.clone().oneshot(request)).await;
        assert!(outcome.is_err(), "POST {uri} finished before it was dropped");
    }

    /// Post, expect the redirect back to `/`, and follow it.
    async fn post_and_follow(&mut self, uri: &str, form: &str) -> Reply {
        let reply = self.post(uri, form).await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER, "POST {uri}: {}", reply.body);
        assert_eq!(reply.location(), Some("/"));
        self.get("/").await
    }
}

/// Store whose inserts always fail at the transport layer.
struct UnreachableStore;

#[async_trait::async_trait]
impl LeadStore for UnreachableStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn insert(&self, _lead: &NewLead) -> Result<Vec<Lead>, StoreError> {
        Err(StoreError::Transport {
            reason: "connection refused".to_owned(),
        })
    }

    async fn mark_downloaded(&self, id: &LeadId) -> Result<(), StoreError> {
        Err(StoreError::NotFound {
            id: id.to_string(),
        })
    }
}

/// In-memory store whose calls wait for `release` before going through.
struct StallingStore {
    inner: MemoryStore,
    release: Notify,
    stall_insert: bool,
    stall_mark: bool,
}

impl StallingStore {
    fn new(inner: MemoryStore, stall_insert: bool, stall_mark: bool) -> Arc<Self> {
        Arc::new(Self {
            inner,
            release: Notify::new(),
            stall_insert,
            stall_mark,
        })
    }
}

#[async_trait::async_trait]
impl LeadStore for StallingStore {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn insert(&self, lead: &NewLead) -> Result<Vec<Lead>, StoreError> {
        if self.stall_insert {
            self.release.notified().await;
        }
        self.inner.insert(lead).await
    }

    async fn mark_downloaded(&self, id: &LeadId) -> Result<(), StoreError> {
        if self.stall_mark {
            self.release.notified().await;
        }
        self.inner.mark_downloaded(id).await
    }
}

// ── Page and session ─────────────────────────────────────────────────

#[tokio::test]
async fn first_visit_sets_session_cookie_and_renders_step_one() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    let reply = visitor.get("/").await;
    assert_eq!(reply.status, StatusCode::OK);

    let cookie = reply.headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("lf_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    assert!(reply.body.contains("Unlock the Secrets to Effective Marketing"));
    assert!(reply.body.contains("Get Your Free Guide"));
    assert!(reply.body.contains("aria-label=\"Step 1 of 2\""));
    assert!(reply.body.contains("action=\"/basic\""));

    // The known session is reused, so no second cookie.
    let again = visitor.get("/").await;
    assert!(again.headers.get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn forged_session_cookie_is_replaced() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));
    visitor.cookie = Some("lf_session=not-a-uuid".to_owned());

    let reply = visitor.get("/").await;
    assert!(reply.headers.get(SET_COOKIE).is_some());
}

// ── Staged flow ──────────────────────────────────────────────────────

#[tokio::test]
async fn staged_happy_path_persists_one_lead() {
    let store = MemoryStore::new();
    let mut visitor = Visitor::new(app_with(
        Arc::new(store.clone()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    let page = visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    assert!(page.body.contains("Almost There!"));
    assert!(page.body.contains("aria-label=\"Step 2 of 2\""));

    let page = visitor
        .post_and_follow("/contact", "phone=&consent=on")
        .await;
    assert!(page.body.contains("Thank You!"));
    assert!(page.body.contains("Thank you for signing up!"));
    assert!(page.body.contains("toast toast-success"));
    assert!(page.body.contains("Download Your Guide"));

    // The toast is shown once.
    let again = visitor.get("/").await;
    assert!(!again.body.contains("Thank you for signing up!"));

    let leads = store.leads().await;
    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.name, "Jane Doe");
    assert_eq!(lead.email, "jane@example.com");
    assert_eq!(lead.phone, None);
    assert!(lead.consent);
    assert!(!lead.downloaded());
    assert_eq!(lead.lead_source, "website_funnel");
}

#[tokio::test]
async fn short_name_keeps_visitor_on_step_one() {
    let store = MemoryStore::new();
    let mut visitor = Visitor::new(app_with(
        Arc::new(store.clone()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    let page = visitor
        .post_and_follow("/basic", "name=J&email=jane%40example.com")
        .await;
    assert!(page.body.contains("action=\"/basic\""));
    assert!(page.body.contains("Name must be at least 2 characters"));
    assert!(page.body.contains("value=\"jane@example.com\""));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn missing_consent_blocks_submission() {
    let store = MemoryStore::new();
    let mut visitor = Visitor::new(app_with(
        Arc::new(store.clone()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    let page = visitor
        .post_and_follow("/contact", "phone=%2B1+555+123+4567")
        .await;

    assert!(page.body.contains("Almost There!"));
    assert!(page.body.contains("You must agree to receive communications"));
    assert!(page.body.contains("value=\"+1 555 123 4567\""));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn backend_failure_shows_toast_and_keeps_values() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(UnreachableStore),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    let page = visitor
        .post_and_follow("/contact", "phone=555-0100&consent=on")
        .await;

    assert!(page.body.contains("toast toast-error"));
    assert!(page.body.contains("Something went wrong. Please try again."));
    assert!(page.body.contains("Almost There!"));
    assert!(page.body.contains("value=\"555-0100\""));
    assert!(page.body.contains("name=\"consent\" value=\"on\" checked"));

    // Going back still shows the first step's values.
    let page = visitor.post_and_follow("/back", "").await;
    assert!(page.body.contains("value=\"Jane Doe\""));
}

#[tokio::test]
async fn back_preserves_contact_values() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    let page = visitor.post_and_follow("/back", "").await;
    assert!(page.body.contains("action=\"/basic\""));
    assert!(page.body.contains("value=\"Jane Doe\""));

    let page = visitor
        .post_and_follow("/basic", "name=Jane+Roe&email=jane%40example.com")
        .await;
    assert!(page.body.contains("Almost There!"));
}

#[tokio::test]
async fn contact_post_on_step_one_is_ignored() {
    let store = MemoryStore::new();
    let mut visitor = Visitor::new(app_with(
        Arc::new(store.clone()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    let page = visitor
        .post_and_follow("/contact", "phone=&consent=on")
        .await;
    assert!(page.body.contains("action=\"/basic\""));
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn dropped_submit_times_out_back_to_editable_step() {
    let store = StallingStore::new(MemoryStore::new(), true, false);
    let mut visitor = Visitor::new(app_with(store, FunnelPolicy::default(), remote_guide()));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    visitor.abandon("/contact", "phone=&consent=on").await;

    let page = visitor.get("/").await;
    assert!(page.body.contains("Processing..."));

    // Past the 15 s submit bound.
    tokio::time::sleep(Duration::from_secs(30)).await;

    let page = visitor.get("/").await;
    assert!(!page.body.contains("Processing..."));
    assert!(page.body.contains("Something went wrong. Please try again."));
    assert!(page.body.contains("action=\"/back\""));
    assert!(page.body.contains("name=\"consent\" value=\"on\" checked"));
}

#[tokio::test(start_paused = true)]
async fn dropped_submit_still_records_the_lead() {
    let memory = MemoryStore::new();
    let store = StallingStore::new(memory.clone(), true, false);
    let mut visitor = Visitor::new(app_with(
        Arc::clone(&store) as Arc<dyn LeadStore>,
        FunnelPolicy::default(),
        remote_guide(),
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    visitor.abandon("/contact", "consent=on").await;

    store.release.notify_one();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let page = visitor.get("/").await;
    assert!(page.body.contains("Thank You!"));
    assert_eq!(memory.len().await, 1);
}

// ── Collapsed flow ───────────────────────────────────────────────────

#[tokio::test]
async fn collapsed_flow_submits_from_single_step() {
    let store = MemoryStore::new();
    let policy = FunnelPolicy {
        flow: FlowVariant::Collapsed,
        ..FunnelPolicy::default()
    };
    let mut visitor = Visitor::new(app_with(Arc::new(store.clone()), policy, remote_guide()));

    let page = visitor.get("/").await;
    assert!(page.body.contains("aria-label=\"Step 1 of 1\""));
    assert!(page.body.contains("name=\"consent\""));

    let page = visitor
        .post_and_follow(
            "/basic",
            "name=Jane+Doe&email=jane%40example.com&phone=555-0100&consent=on",
        )
        .await;
    assert!(page.body.contains("Thank You!"));

    let leads = store.leads().await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].phone.as_deref(), Some("555-0100"));
}

// ── Download ─────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_download_redirects_and_marks_lead() {
    let store = MemoryStore::new();
    let mut visitor = Visitor::new(app_with(
        Arc::new(store.clone()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    visitor
        .post_and_follow("/contact", "consent=on")
        .await;

    let reply = visitor.post("/download", "").await;
    assert!(reply.status.is_redirection());
    assert_eq!(reply.location(), Some(GUIDE_URL));

    let leads = store.leads().await;
    assert!(leads[0].downloaded());

    // A second download is still delivered.
    let reply = visitor.post("/download", "").await;
    assert_eq!(reply.location(), Some(GUIDE_URL));
}

#[tokio::test]
async fn local_download_is_served_as_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guide.pdf");
    tokio::fs::write(&path, b"%PDF-1.4 guide").await.unwrap();

    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        DownloadResource::Local {
            path,
            file_name: "marketing-guide.pdf".to_owned(),
        },
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    visitor
        .post_and_follow("/contact", "consent=on")
        .await;

    let reply = visitor.post("/download", "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers.get(CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"marketing-guide.pdf\""
    );
    assert_eq!(reply.headers.get(CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(reply.body, "%PDF-1.4 guide");
}

#[tokio::test(start_paused = true)]
async fn dropped_download_does_not_block_later_downloads() {
    let store = StallingStore::new(MemoryStore::new(), false, true);
    let mut visitor = Visitor::new(app_with(store, FunnelPolicy::default(), remote_guide()));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    visitor
        .post_and_follow("/contact", "consent=on")
        .await;
    visitor.abandon("/download", "").await;

    // A second click while the first is still recording lands on the page.
    let reply = visitor.post("/download", "").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/"));

    tokio::time::sleep(Duration::from_secs(30)).await;

    let reply = visitor.post("/download", "").await;
    assert!(reply.status.is_redirection());
    assert_eq!(reply.location(), Some(GUIDE_URL));
}

#[tokio::test]
async fn download_before_success_goes_back_to_page() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    let reply = visitor.post("/download", "").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/"));
}

// ── System routes ────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_reports_store() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));
    visitor.get("/").await;

    let reply = visitor.get("/healthz").await;
    assert_eq!(reply.status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
    assert_eq!(json["store_configured"], true);
    assert_eq!(json["sessions"], 1);
}

#[tokio::test]
async fn metrics_count_outcomes() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    visitor
        .post_and_follow("/basic", "name=Jane+Doe&email=jane%40example.com")
        .await;
    visitor.post_and_follow("/contact", "phone=").await;
    visitor
        .post_and_follow("/contact", "consent=on")
        .await;
    visitor.post("/download", "").await;

    let reply = visitor.get("/metrics").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(
        reply
            .headers
            .get(CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain; version=0.0.4")
    );
    assert!(reply.body.contains("leadfunnel_leads_submitted_total 1"));
    assert!(reply.body.contains("leadfunnel_leads_failed_total 0"));
    assert!(reply.body.contains("leadfunnel_downloads_delivered_total 1"));
    assert!(reply.body.contains("leadfunnel_sessions 1"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let mut visitor = Visitor::new(app_with(
        Arc::new(MemoryStore::new()),
        FunnelPolicy::default(),
        remote_guide(),
    ));

    for uri in ["/", "/healthz"] {
        let reply = visitor.get(uri).await;
        assert_eq!(reply.headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(reply.headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(reply.headers.get("cache-control").unwrap(), "no-store");
    }
}
