//! Core library for `leadfunnel`.
//!
//! Contains the validation schema, the step controller that walks a visitor
//! from basic info to consent to success, the submission gateway that
//! forwards a validated lead to the backend, and the download trigger that
//! records the download and hands out the resource. This crate depends on
//! `leadfunnel-store` for the lead model and the [`LeadStore`] contract and
//! knows nothing about HTTP or HTML.
//!
//! [`LeadStore`]: leadfunnel_store::LeadStore

pub mod download;
pub mod error;
pub mod funnel;
pub mod gateway;
pub mod observer;
pub mod policy;
pub mod validation;

pub use download::{DownloadResource, DownloadTicket, DownloadTrigger};
pub use error::{FunnelError, GatewayError, PolicyParseError};
pub use funnel::{FieldValue, FormInput, Funnel, Notice, NoticeKind, Step};
pub use gateway::SubmissionGateway;
pub use observer::{FunnelMetrics, FunnelObserver, MetricsSnapshot, ObserverSet, TracingObserver};
pub use policy::{ConsentPolicy, FlowVariant, FunnelPolicy};
pub use validation::{Field, FieldError, FieldErrors, LeadForm, ValidationSchema};
