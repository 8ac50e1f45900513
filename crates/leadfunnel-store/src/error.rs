//! Store error types.
//!
//! Every variant carries enough context to diagnose the problem from a log
//! line. The API key never appears in an error message.

/// Errors that can occur while talking to the lead backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection parameters are missing; every call fails until restart.
    #[error("lead store is not configured: missing {missing}")]
    NotConfigured { missing: String },

    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("request to lead backend failed: {reason}")]
    Transport { reason: String },

    /// The backend answered with a non-success status.
    #[error("lead backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The backend answered, but the body was not what we expected.
    #[error("failed to decode lead backend response: {reason}")]
    Decode { reason: String },

    /// No lead with this id exists.
    #[error("lead '{id}' not found")]
    NotFound { id: String },
}

impl StoreError {
    /// Whether the failure happened before a response was received.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::NotConfigured { .. })
    }
}

#[cfg(feature = "postgrest")]
impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                reason: err.to_string(),
            }
        } else {
            Self::Transport {
                reason: err.without_url().to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }
}
