//! Server configuration for `leadfunnel`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `LEADFUNNEL_*` environment variables.
//! Nothing here is fatal: an unparseable value falls back to its default
//! and leaves a warning for `main` to log once tracing is up.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use leadfunnel_core::policy::DEFAULT_SUBMIT_TIMEOUT;
use leadfunnel_core::{ConsentPolicy, DownloadResource, FlowVariant, FunnelPolicy};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TABLE: &str = "leads";
const DEFAULT_DOWNLOAD_URL: &str =
    "https://www.w3.org/WAI/ER/tests/xhtml/testfiles/resources/pdf/dummy.pdf";
const DEFAULT_DOWNLOAD_FILENAME: &str = "free-guide.pdf";
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_TITLE: &str = "Unlock the Secrets to Effective Marketing";
const DEFAULT_SUBTITLE: &str = "Get our exclusive guide with proven strategies that have helped \
     businesses increase their conversion rates by up to 300%.";
const DEFAULT_HIGHLIGHTS: [&str; 3] = [
    "Step-by-step guide",
    "Actionable templates",
    "Expert insights",
];

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Lead store backend.
    pub store: StoreBackendType,
    /// Funnel behaviour shared by every session.
    pub policy: FunnelPolicy,
    /// What the success screen hands out.
    pub download: DownloadResource,
    /// Idle time after which a visitor's session is dropped.
    pub session_ttl: Duration,
    /// Marketing copy for the page header.
    pub content: PageContent,
    /// Problems found while loading. Logged by `main` after tracing starts.
    pub warnings: Vec<String>,
}

/// Supported lead store backends.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackendType {
    /// In-memory (development only, leads lost on restart).
    Memory,
    /// Hosted PostgREST endpoint (Supabase).
    Postgrest {
        url: Option<String>,
        api_key: Option<String>,
        table: String,
    },
}

impl std::fmt::Debug for StoreBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Postgrest { url, api_key, table } => f
                .debug_struct("Postgrest")
                .field("url", url)
                .field("api_key", &api_key.as_ref().map(|_| "[redacted]"))
                .field("table", table)
                .finish(),
        }
    }
}

/// Lead-magnet header copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub subtitle: String,
    pub highlights: Vec<String>,
}

impl Default for PageContent {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_owned(),
            subtitle: DEFAULT_SUBTITLE.to_owned(),
            highlights: DEFAULT_HIGHLIGHTS.iter().map(|&h| h.to_owned()).collect(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (platform convention, binds to `0.0.0.0`)
    /// - `LEADFUNNEL_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8080`)
    /// - `LEADFUNNEL_LOG_LEVEL`: log filter (default: `info`)
    /// - `LEADFUNNEL_STORE`: `postgrest` or `memory` (default: `postgrest`)
    /// - `LEADFUNNEL_SUPABASE_URL` / `SUPABASE_URL`: backend project URL
    /// - `LEADFUNNEL_SUPABASE_ANON_KEY` / `SUPABASE_ANON_KEY`: public API key
    /// - `LEADFUNNEL_LEADS_TABLE`: table name (default: `leads`)
    /// - `LEADFUNNEL_LEAD_SOURCE`: campaign tag (default: `website_funnel`)
    /// - `LEADFUNNEL_CONSENT_POLICY`: `required` or `default-granted` (default: `required`)
    /// - `LEADFUNNEL_FLOW`: `staged` or `collapsed` (default: `staged`)
    /// - `LEADFUNNEL_SUBMIT_TIMEOUT_SECS`: submit bound, `0` for none (default: `15`)
    /// - `LEADFUNNEL_DOWNLOAD_URL`: remote resource URL
    /// - `LEADFUNNEL_DOWNLOAD_PATH`: local resource file (wins over the URL)
    /// - `LEADFUNNEL_DOWNLOAD_FILENAME`: suggested file name (default: `free-guide.pdf`)
    /// - `LEADFUNNEL_SESSION_TTL_SECS`: idle session lifetime (default: `3600`)
    /// - `LEADFUNNEL_TITLE`, `LEADFUNNEL_SUBTITLE`, `LEADFUNNEL_HIGHLIGHTS`: header copy
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    #[allow(clippy::too_many_lines)]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let mut warnings = Vec::new();

        // Priority: LEADFUNNEL_BIND_ADDR > PORT > default 127.0.0.1:8080
        let default_addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));
        let bind_addr = if let Some(addr) = var("LEADFUNNEL_BIND_ADDR") {
            addr.parse().unwrap_or_else(|_| {
                warnings.push(format!("invalid LEADFUNNEL_BIND_ADDR '{addr}', using {default_addr}"));
                default_addr
            })
        } else if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => SocketAddr::from(([0, 0, 0, 0], port)),
                Err(_) => {
                    warnings.push(format!("invalid PORT '{port}', using {default_addr}"));
                    default_addr
                }
            }
        } else {
            default_addr
        };

        let log_level = var("LEADFUNNEL_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let store = match var("LEADFUNNEL_STORE")
            .unwrap_or_else(|| "postgrest".to_owned())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreBackendType::Memory,
            other => {
                if !matches!(other, "postgrest" | "supabase") {
                    warnings.push(format!("unknown LEADFUNNEL_STORE '{other}', using postgrest"));
                }
                StoreBackendType::Postgrest {
                    url: var("LEADFUNNEL_SUPABASE_URL").or_else(|| var("SUPABASE_URL")),
                    api_key: var("LEADFUNNEL_SUPABASE_ANON_KEY")
                        .or_else(|| var("SUPABASE_ANON_KEY")),
                    table: var("LEADFUNNEL_LEADS_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_owned()),
                }
            }
        };

        let mut policy = FunnelPolicy::default();
        if let Some(source) = var("LEADFUNNEL_LEAD_SOURCE") {
            policy.lead_source = source;
        }
        if let Some(raw) = var("LEADFUNNEL_CONSENT_POLICY") {
            match raw.parse::<ConsentPolicy>() {
                Ok(consent) => policy.consent = consent,
                Err(e) => warnings.push(format!("{e}; using {}", policy.consent)),
            }
        }
        if let Some(raw) = var("LEADFUNNEL_FLOW") {
            match raw.parse::<FlowVariant>() {
                Ok(flow) => policy.flow = flow,
                Err(e) => warnings.push(format!("{e}; using {}", policy.flow)),
            }
        }
        if let Some(raw) = var("LEADFUNNEL_SUBMIT_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(0) => policy.submit_timeout = None,
                Ok(secs) => policy.submit_timeout = Some(Duration::from_secs(secs)),
                Err(_) => warnings.push(format!(
                    "invalid LEADFUNNEL_SUBMIT_TIMEOUT_SECS '{raw}', using {}s",
                    DEFAULT_SUBMIT_TIMEOUT.as_secs()
                )),
            }
        }

        let file_name =
            var("LEADFUNNEL_DOWNLOAD_FILENAME").unwrap_or_else(|| DEFAULT_DOWNLOAD_FILENAME.to_owned());
        let download = match var("LEADFUNNEL_DOWNLOAD_PATH") {
            Some(path) => DownloadResource::Local {
                path: PathBuf::from(path),
                file_name,
            },
            None => DownloadResource::Remote {
                url: var("LEADFUNNEL_DOWNLOAD_URL")
                    .unwrap_or_else(|| DEFAULT_DOWNLOAD_URL.to_owned()),
                file_name,
            },
        };

        let session_ttl = match var("LEADFUNNEL_SESSION_TTL_SECS").map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
            Some(_) => {
                warnings.push(format!(
                    "invalid LEADFUNNEL_SESSION_TTL_SECS, using {}s",
                    DEFAULT_SESSION_TTL.as_secs()
                ));
                DEFAULT_SESSION_TTL
            }
            None => DEFAULT_SESSION_TTL,
        };

        let defaults = PageContent::default();
        let content = PageContent {
            title: var("LEADFUNNEL_TITLE").unwrap_or(defaults.title),
            subtitle: var("LEADFUNNEL_SUBTITLE").unwrap_or(defaults.subtitle),
            highlights: var("LEADFUNNEL_HIGHLIGHTS").map_or(defaults.highlights, |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_owned)
                    .collect()
            }),
        };

        Self {
            bind_addr,
            log_level,
            store,
            policy,
            download,
            session_ttl,
            content,
            warnings,
        }
    }
}
