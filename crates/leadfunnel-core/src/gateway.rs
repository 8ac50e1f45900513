//! Submission gateway: validate, apply defaults, insert, classify.
//!
//! The gateway is the only component that creates leads. It never retries;
//! a failed submission is reported once and the caller decides what the
//! visitor sees. Exactly one backend insert is issued per call that passes
//! validation.

use std::sync::Arc;
use std::time::Duration;

use leadfunnel_store::{Lead, LeadDraft, LeadStore};
use tracing::debug;

use crate::error::GatewayError;
use crate::observer::FunnelObserver;
use crate::policy::FunnelPolicy;
use crate::validation::ValidationSchema;

/// Forwards validated lead drafts to a [`LeadStore`].
pub struct SubmissionGateway {
    store: Arc<dyn LeadStore>,
    schema: ValidationSchema,
    lead_source: String,
    timeout: Option<Duration>,
    observer: Arc<dyn FunnelObserver>,
}

impl SubmissionGateway {
    /// Create a gateway writing to `store` under `policy`.
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        policy: &FunnelPolicy,
        observer: Arc<dyn FunnelObserver>,
    ) -> Self {
        Self {
            store,
            schema: ValidationSchema::new(policy.consent),
            lead_source: policy.lead_source.clone(),
            timeout: policy.submit_timeout.filter(|t| !t.is_zero()),
            observer,
        }
    }

    /// Campaign tag applied to drafts that arrive without one.
    #[must_use]
    pub fn lead_source(&self) -> &str {
        &self.lead_source
    }

    /// Validate `draft`, persist it, and return the stored lead.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Validation`] if the draft fails the schema; nothing
    ///   is sent.
    /// - [`GatewayError::Transport`] if the backend call fails.
    /// - [`GatewayError::Timeout`] if the backend does not answer in time.
    /// - [`GatewayError::NoRowReturned`] if the backend answers with no row.
    /// - [`GatewayError::UnexpectedRows`] if it answers with several.
    pub async fn submit(&self, draft: LeadDraft) -> Result<Lead, GatewayError> {
        let result = self.try_submit(draft).await;
        match &result {
            Ok(lead) => self.observer.lead_submitted(lead),
            Err(e) => self.observer.submission_failed(e),
        }
        result
    }

    async fn try_submit(&self, draft: LeadDraft) -> Result<Lead, GatewayError> {
        self.schema
            .validate_draft(&draft)
            .map_err(GatewayError::Validation)?;

        let new_lead = draft.into_new_lead(&self.lead_source);
        debug!(store = self.store.name(), lead_source = %new_lead.lead_source, "inserting lead");

        let insert = self.store.insert(&new_lead);
        let mut rows = match self.timeout {
            Some(after) => tokio::time::timeout(after, insert)
                .await
                .map_err(|_| GatewayError::Timeout { after })??,
            None => insert.await?,
        };

        match rows.len() {
            0 => Err(GatewayError::NoRowReturned),
            1 => Ok(rows.remove(0)),
            count => Err(GatewayError::UnexpectedRows { count }),
        }
    }
}

impl std::fmt::Debug for SubmissionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionGateway")
            .field("store", &self.store.name())
            .field("lead_source", &self.lead_source)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use leadfunnel_store::{LeadId, MemoryStore, NewLead, StoreError};

    use super::*;
    use crate::observer::FunnelMetrics;
    use crate::policy::ConsentPolicy;
    use crate::validation::{Field, FieldError};

    /// Store double whose insert behaviour is fixed at construction.
    pub(crate) struct ScriptedStore {
        pub mode: Mode,
        pub inserts: AtomicUsize,
        pub marks: AtomicUsize,
    }

    #[derive(Clone, Copy)]
    pub(crate) enum Mode {
        Fail,
        Empty,
        Duplicate,
        Hang,
        FailMark,
    }

    impl ScriptedStore {
        pub(crate) fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                inserts: AtomicUsize::new(0),
                marks: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl LeadStore for ScriptedStore {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn insert(&self, lead: &NewLead) -> Result<Vec<Lead>, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            let row = || Lead::from_insert(LeadId::generate(), Utc::now(), lead.clone());
            match self.mode {
                Mode::Fail => Err(StoreError::Transport {
                    reason: "connection refused".to_owned(),
                }),
                Mode::Empty => Ok(Vec::new()),
                Mode::Duplicate => Ok(vec![row(), row()]),
                Mode::Hang => std::future::pending().await,
                Mode::FailMark => Ok(vec![row()]),
            }
        }

        async fn mark_downloaded(&self, _id: &LeadId) -> Result<(), StoreError> {
            self.marks.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend {
                status: 503,
                message: "service unavailable".to_owned(),
            })
        }
    }

    fn draft(name: &str, email: &str, consent: bool) -> LeadDraft {
        LeadDraft {
            name: name.to_owned(),
            email: email.to_owned(),
            phone: Some(String::new()),
            consent,
            ..LeadDraft::default()
        }
    }

    fn gateway(store: Arc<dyn LeadStore>, metrics: &Arc<FunnelMetrics>) -> SubmissionGateway {
        SubmissionGateway::new(
            store,
            &FunnelPolicy::default(),
            Arc::clone(metrics) as Arc<dyn FunnelObserver>,
        )
    }

    #[tokio::test]
    async fn valid_draft_persists_exactly_one_lead() {
        let store = MemoryStore::new();
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = gateway(Arc::new(store.clone()), &metrics);

        let lead = gw
            .submit(draft("Jo Lee", "jo@example.com", true))
            .await
            .unwrap();

        assert!(!lead.id().as_str().is_empty());
        assert!(!lead.downloaded());
        assert_eq!(lead.lead_source, "website_funnel");
        assert!(lead.phone.is_none());
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(lead.id()).await.unwrap(), lead);
        assert_eq!(metrics.snapshot().submitted, 1);
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_the_store() {
        let store = MemoryStore::new();
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = gateway(Arc::new(store.clone()), &metrics);

        let err = gw.submit(draft("A", "jo@example", true)).await.unwrap_err();
        match err {
            GatewayError::Validation(errors) => {
                assert_eq!(errors.get(Field::Name), Some(FieldError::TooShort { min: 2 }));
                assert_eq!(errors.get(Field::Email), Some(FieldError::InvalidFormat));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.is_empty().await);
        assert_eq!(metrics.snapshot().rejected, 1);
    }

    #[tokio::test]
    async fn consent_is_enforced_only_when_required() {
        let store = MemoryStore::new();
        let metrics = Arc::new(FunnelMetrics::new());

        let strict = gateway(Arc::new(store.clone()), &metrics);
        let err = strict
            .submit(draft("Jo Lee", "jo@example.com", false))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ref e) if e.get(Field::Consent) == Some(FieldError::ConsentRequired)));

        let lenient = SubmissionGateway::new(
            Arc::new(store.clone()),
            &FunnelPolicy {
                consent: ConsentPolicy::DefaultGranted,
                ..FunnelPolicy::default()
            },
            Arc::clone(&metrics) as Arc<dyn FunnelObserver>,
        );
        let lead = lenient
            .submit(draft("Jo Lee", "jo@example.com", false))
            .await
            .unwrap();
        assert!(!lead.consent);
    }

    #[tokio::test]
    async fn store_failure_is_transport_error() {
        let store = ScriptedStore::new(Mode::Fail);
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = gateway(Arc::clone(&store) as Arc<dyn LeadStore>, &metrics);

        let err = gw
            .submit(draft("Jo Lee", "jo@example.com", true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1, "no automatic retry");
        assert_eq!(metrics.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn zero_rows_is_no_row_returned() {
        let store = ScriptedStore::new(Mode::Empty);
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = gateway(store, &metrics);

        let err = gw
            .submit(draft("Jo Lee", "jo@example.com", true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoRowReturned));
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }

    #[tokio::test]
    async fn several_rows_are_rejected() {
        let store = ScriptedStore::new(Mode::Duplicate);
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = gateway(store, &metrics);

        let err = gw
            .submit(draft("Jo Lee", "jo@example.com", true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnexpectedRows { count: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_times_out() {
        let store = ScriptedStore::new(Mode::Hang);
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = SubmissionGateway::new(
            store,
            &FunnelPolicy {
                submit_timeout: Some(Duration::from_secs(5)),
                ..FunnelPolicy::default()
            },
            Arc::clone(&metrics) as Arc<dyn FunnelObserver>,
        );

        let err = gw
            .submit(draft("Jo Lee", "jo@example.com", true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { after } if after == Duration::from_secs(5)));
        assert_eq!(metrics.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn explicit_lead_source_is_kept() {
        let store = MemoryStore::new();
        let metrics = Arc::new(FunnelMetrics::new());
        let gw = gateway(Arc::new(store), &metrics);

        let mut d = draft("Jo Lee", "jo@example.com", true);
        d.lead_source = Some("partner_webinar".to_owned());
        let lead = gw.submit(d).await.unwrap();
        assert_eq!(lead.lead_source, "partner_webinar");
        assert_eq!(gw.lead_source(), "website_funnel");
    }
}
