//! Error types for `leadfunnel-core`.
//!
//! Validation failures are field-level and never leave the step controller
//! except as rendered messages. Gateway failures carry full detail for logs
//! and collapse to one visitor-facing sentence via
//! [`GatewayError::user_message`].

use std::time::Duration;

use leadfunnel_store::StoreError;

use crate::funnel::Step;
use crate::validation::FieldErrors;

/// Message shown to the visitor for every non-validation submission failure.
pub const SUBMISSION_FAILED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors from the submission gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The draft failed validation; nothing was sent.
    #[error("lead failed validation: {0}")]
    Validation(FieldErrors),

    /// The backend call itself failed (unreachable, misconfigured, or
    /// rejected).
    #[error("lead submission failed: {0}")]
    Transport(#[from] StoreError),

    /// The backend did not answer within the configured bound.
    #[error("lead submission timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    /// The backend reported success but returned no row.
    #[error("lead backend returned no row for the insert")]
    NoRowReturned,

    /// The backend returned more than the one row inserted.
    #[error("lead backend returned {count} rows for a single insert")]
    UnexpectedRows { count: usize },
}

impl GatewayError {
    /// The single sentence shown to the visitor.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Please correct the highlighted fields.",
            Self::Transport(_)
            | Self::Timeout { .. }
            | Self::NoRowReturned
            | Self::UnexpectedRows { .. } => SUBMISSION_FAILED_MESSAGE,
        }
    }

    /// Short machine-readable label, used as a metrics and log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Timeout { .. } => "timeout",
            Self::NoRowReturned => "no_row_returned",
            Self::UnexpectedRows { .. } => "unexpected_rows",
        }
    }
}

/// Errors from step controller transitions.
#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    /// One or more fields are invalid; the funnel stayed where it was.
    #[error("form has invalid fields: {0}")]
    Invalid(FieldErrors),

    /// The requested action is not available in the current step.
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: Step, action: &'static str },

    /// Field values can only change while the form is editable.
    #[error("form is not editable while {step}")]
    NotEditable { step: Step },

    /// A submission for this funnel is already outstanding.
    #[error("a submission is already in progress")]
    SubmissionInFlight,

    /// A download for this funnel is already outstanding.
    #[error("a download is already in progress")]
    DownloadInFlight,

    /// The gateway rejected the submission; the funnel is editable again.
    #[error(transparent)]
    Submission(#[from] GatewayError),
}

/// Errors from parsing policy settings.
#[derive(Debug, thiserror::Error)]
#[error("invalid {setting} '{value}', expected one of: {expected}")]
pub struct PolicyParseError {
    pub setting: &'static str,
    pub value: String,
    pub expected: &'static str,
}
