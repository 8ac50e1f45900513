//! Per-visitor funnel sessions.
//!
//! Each browser gets an opaque `lf_session` cookie naming one [`Funnel`] held
//! in memory. The registry lock is only ever held for synchronous funnel
//! edits; handlers release it before calling the backend and take it again
//! to apply the result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use leadfunnel_core::{Funnel, FunnelPolicy, Step};
use tokio::sync::{RwLock, watch};
use tokio::time::Instant;
use tracing::{debug, info};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "lf_session";

/// Opaque session identifier (a v4 UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Accept only well-formed ids so arbitrary cookie values never become
    /// map keys.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        uuid::Uuid::parse_str(raw)
            .ok()
            .map(|u| Self(u.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read the session id from a request's `Cookie` headers.
#[must_use]
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value))
}

/// `Set-Cookie` value for `id`.
#[must_use]
pub fn session_cookie(id: &SessionId) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

struct SessionEntry {
    funnel: Funnel,
    last_seen: Instant,
}

/// All live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    policy: FunnelPolicy,
    ttl: Duration,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(policy: FunnelPolicy, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
            ttl,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &FunnelPolicy {
        &self.policy
    }

    /// Return the live session for `requested`, or start a new one.
    ///
    /// The flag is `true` when a session was created and the caller must
    /// set the cookie.
    pub async fn resolve(&self, requested: Option<SessionId>) -> (SessionId, bool) {
        let mut sessions = self.sessions.write().await;
        if let Some(id) = requested {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = Instant::now();
                return (id, false);
            }
        }

        let id = SessionId::generate();
        sessions.insert(
            id.clone(),
            SessionEntry {
                funnel: Funnel::new(&self.policy),
                last_seen: Instant::now(),
            },
        );
        debug!(sessions = sessions.len(), "session started");
        (id, true)
    }

    /// Run `f` against the funnel for `id`. `None` if the session is gone.
    pub async fn with<R>(&self, id: &SessionId, f: impl FnOnce(&mut Funnel) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(f(&mut entry.funnel))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the TTL. A session with a
    /// submission in flight is kept so the result has somewhere to land.
    pub async fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.funnel.step() == Step::Submitting
                || now.saturating_duration_since(entry.last_seen) < self.ttl
        });
        before.saturating_sub(sessions.len())
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Background worker that periodically prunes idle sessions until shutdown.
pub async fn sweep_idle_sessions(
    registry: Arc<SessionRegistry>,
    mut shutdown: watch::Receiver<bool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    info!(interval_secs = interval.as_secs(), "session sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pruned = registry.prune_idle().await;
                if pruned > 0 {
                    info!(pruned, "pruned idle sessions");
                }
            }
            _ = shutdown.changed() => {
                info!("session sweeper shutting down");
                return;
            }
        }
    }
}
