//! Funnel policy: the knobs that differ between deployments.
//!
//! Consent handling and the submit timeout are explicit configuration rather
//! than behaviour baked into one form or another.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PolicyParseError;

/// Campaign tag applied when the caller does not supply one.
pub const DEFAULT_LEAD_SOURCE: &str = "website_funnel";

/// Default bound on one submission round-trip.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// How the consent checkbox gates submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsentPolicy {
    /// The box starts unchecked and must be checked to submit.
    #[default]
    Required,
    /// The box starts checked; unchecking it is recorded, not rejected.
    DefaultGranted,
}

impl ConsentPolicy {
    /// Initial value of the consent checkbox.
    #[must_use]
    pub fn initial_consent(self) -> bool {
        matches!(self, Self::DefaultGranted)
    }
}

impl FromStr for ConsentPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "required" | "strict" => Ok(Self::Required),
            "default-granted" | "default_granted" | "lenient" => Ok(Self::DefaultGranted),
            _ => Err(PolicyParseError {
                setting: "consent policy",
                value: s.to_owned(),
                expected: "required, default-granted",
            }),
        }
    }
}

impl fmt::Display for ConsentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Required => "required",
            Self::DefaultGranted => "default-granted",
        })
    }
}

/// Shape of the form flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowVariant {
    /// Basic info, then contact + consent, then success.
    #[default]
    Staged,
    /// Every field on one screen, then success.
    Collapsed,
}

impl FlowVariant {
    /// Number of editable screens before success.
    #[must_use]
    pub fn editable_steps(self) -> usize {
        match self {
            Self::Staged => 2,
            Self::Collapsed => 1,
        }
    }
}

impl FromStr for FlowVariant {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staged" | "two-step" => Ok(Self::Staged),
            "collapsed" | "single" | "single-step" => Ok(Self::Collapsed),
            _ => Err(PolicyParseError {
                setting: "flow",
                value: s.to_owned(),
                expected: "staged, collapsed",
            }),
        }
    }
}

impl fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Staged => "staged",
            Self::Collapsed => "collapsed",
        })
    }
}

/// Everything the funnel, gateway and trigger need to agree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelPolicy {
    pub consent: ConsentPolicy,
    pub flow: FlowVariant,
    /// Campaign tag stamped on leads that arrive without one.
    pub lead_source: String,
    /// Upper bound on one backend round-trip. `None` waits indefinitely.
    pub submit_timeout: Option<Duration>,
}

impl Default for FunnelPolicy {
    fn default() -> Self {
        Self {
            consent: ConsentPolicy::default(),
            flow: FlowVariant::default(),
            lead_source: DEFAULT_LEAD_SOURCE.to_owned(),
            submit_timeout: Some(DEFAULT_SUBMIT_TIMEOUT),
        }
    }
}
