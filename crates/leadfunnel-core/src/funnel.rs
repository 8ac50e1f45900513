//! Step controller for one visitor's trip through the funnel.
//!
//! A [`Funnel`] owns the form values, the current [`Step`], and the lead once
//! it exists. It performs no I/O of its own: [`Funnel::submit`] and
//! [`Funnel::download`] borrow a gateway or trigger for the one call that
//! needs it, and the `begin_*`/`complete_*` pairs let a caller release any
//! lock it holds on the funnel while that call is in flight.
//!
//! ```text
//! CollectingBasicInfo --advance--> CollectingContactConsent --submit--> Submitting --ok--> Success
//!         ^                                 |                               |
//!         +--------------back---------------+          <--------err---------+
//! ```
//!
//! Under [`FlowVariant::Collapsed`] every field lives on the first step and
//! submission starts there.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use leadfunnel_store::{Lead, LeadDraft};

use crate::download::{DownloadTicket, DownloadTrigger};
use crate::error::{FunnelError, GatewayError};
use crate::gateway::SubmissionGateway;
use crate::policy::{FlowVariant, FunnelPolicy};
use crate::validation::{Field, FieldErrors, LeadForm, ValidationSchema};

/// Shown once a lead has been stored.
pub const SUCCESS_NOTICE: &str = "Thank you for signing up!";

const BASIC_FIELDS: [Field; 2] = [Field::Name, Field::Email];
const CONTACT_FIELDS: [Field; 2] = [Field::Phone, Field::Consent];

/// Where the visitor is in the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CollectingBasicInfo,
    CollectingContactConsent,
    Submitting,
    Success,
}

impl Step {
    /// Whether field values may change in this step.
    #[must_use]
    pub fn is_editable(self) -> bool {
        matches!(self, Self::CollectingBasicInfo | Self::CollectingContactConsent)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CollectingBasicInfo => "collecting basic info",
            Self::CollectingContactConsent => "collecting contact details",
            Self::Submitting => "submitting",
            Self::Success => "finished",
        })
    }
}

/// A single field edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Name(String),
    Email(String),
    Phone(String),
    Consent(bool),
}

impl FieldValue {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::Name(_) => Field::Name,
            Self::Email(_) => Field::Email,
            Self::Phone(_) => Field::Phone,
            Self::Consent(_) => Field::Consent,
        }
    }
}

/// A batch of edits, as posted by one form. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent: Option<bool>,
}

impl FormInput {
    fn into_values(self) -> impl Iterator<Item = FieldValue> {
        [
            self.name.map(FieldValue::Name),
            self.email.map(FieldValue::Email),
            self.phone.map(FieldValue::Phone),
            self.consent.map(FieldValue::Consent),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A transient notification (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// One visitor's funnel.
#[derive(Debug, Clone)]
pub struct Funnel {
    schema: ValidationSchema,
    flow: FlowVariant,
    step: Step,
    /// Editable step to return to if the in-flight submission fails.
    resume_step: Step,
    form: LeadForm,
    touched: BTreeSet<Field>,
    errors: FieldErrors,
    lead: Option<Lead>,
    downloading: bool,
    notices: VecDeque<Notice>,
}

impl Funnel {
    /// A fresh funnel on the first step. Consent starts at the policy's
    /// default.
    #[must_use]
    pub fn new(policy: &FunnelPolicy) -> Self {
        Self {
            schema: ValidationSchema::new(policy.consent),
            flow: policy.flow,
            step: Step::CollectingBasicInfo,
            resume_step: Step::CollectingBasicInfo,
            form: LeadForm {
                consent: policy.consent.initial_consent(),
                ..LeadForm::default()
            },
            touched: BTreeSet::new(),
            errors: FieldErrors::new(),
            lead: None,
            downloading: false,
            notices: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn step(&self) -> Step {
        self.step
    }

    #[must_use]
    pub fn flow(&self) -> FlowVariant {
        self.flow
    }

    #[must_use]
    pub fn form(&self) -> &LeadForm {
        &self.form
    }

    /// Live errors for fields the visitor has touched.
    #[must_use]
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// The stored lead, once the funnel reaches [`Step::Success`].
    #[must_use]
    pub fn lead(&self) -> Option<&Lead> {
        self.lead.as_ref()
    }

    #[must_use]
    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    /// Fields shown on the current screen. While submitting this is the
    /// screen the submission came from.
    #[must_use]
    pub fn visible_fields(&self) -> &'static [Field] {
        let step = match self.step {
            Step::Submitting => self.resume_step,
            other => other,
        };
        match (step, self.flow) {
            (Step::CollectingBasicInfo, FlowVariant::Collapsed) => &Field::ALL,
            (Step::CollectingBasicInfo, FlowVariant::Staged) => &BASIC_FIELDS,
            (Step::CollectingContactConsent, _) => &CONTACT_FIELDS,
            (Step::Submitting | Step::Success, _) => &[],
        }
    }

    /// 1-based position for a progress indicator. [`Step::Success`] is one
    /// past the last editable step.
    #[must_use]
    pub fn step_number(&self) -> usize {
        let step = match self.step {
            Step::Submitting => self.resume_step,
            other => other,
        };
        match step {
            Step::CollectingBasicInfo => 1,
            Step::CollectingContactConsent => 2,
            Step::Submitting | Step::Success => self.flow.editable_steps() + 1,
        }
    }

    /// Set one field and re-run live validation.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotEditable`] outside the editable steps; the
    /// value is not applied.
    pub fn set_field(&mut self, value: FieldValue) -> Result<(), FunnelError> {
        self.ensure_editable()?;
        self.write_field(value);
        self.revalidate();
        Ok(())
    }

    /// Apply every present field of `input`, then re-run live validation.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotEditable`] outside the editable steps; no
    /// value is applied.
    pub fn apply(&mut self, input: FormInput) -> Result<(), FunnelError> {
        self.ensure_editable()?;
        for value in input.into_values() {
            self.write_field(value);
        }
        self.revalidate();
        Ok(())
    }

    /// Whether the "continue" control would be enabled in a client that
    /// validates while typing.
    ///
    /// The server-rendered page never disables its buttons, since without
    /// script a corrected field can only be re-checked by posting it.
    /// Posts are validated by [`Funnel::advance`] instead.
    #[must_use]
    pub fn can_continue(&self) -> bool {
        self.step == Step::CollectingBasicInfo
            && self.flow == FlowVariant::Staged
            && self.schema.validate_fields(&self.form, &BASIC_FIELDS).is_ok()
    }

    /// Whether the "submit" control would be enabled in a client that
    /// validates while typing. See [`Funnel::can_continue`]; posts are
    /// validated by [`Funnel::begin_submit`].
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.step == self.submit_step() && self.schema.validate(&self.form).is_ok()
    }

    /// Move from basic info to contact details.
    ///
    /// # Errors
    ///
    /// - [`FunnelError::InvalidTransition`] outside
    ///   [`Step::CollectingBasicInfo`] or under the collapsed flow.
    /// - [`FunnelError::Invalid`] when name or email fail; the step is
    ///   unchanged and the errors are shown.
    pub fn advance(&mut self) -> Result<(), FunnelError> {
        if self.step != Step::CollectingBasicInfo || self.flow == FlowVariant::Collapsed {
            return Err(self.invalid_transition("continue"));
        }
        self.touched.extend(BASIC_FIELDS);
        self.revalidate();
        self.schema
            .validate_fields(&self.form, &BASIC_FIELDS)
            .map_err(FunnelError::Invalid)?;

        self.step = Step::CollectingContactConsent;
        Ok(())
    }

    /// Return from contact details to basic info. Values are kept.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidTransition`] from any other step.
    pub fn back(&mut self) -> Result<(), FunnelError> {
        if self.step != Step::CollectingContactConsent {
            return Err(self.invalid_transition("go back"));
        }
        self.step = Step::CollectingBasicInfo;
        Ok(())
    }

    /// Validate everything and enter [`Step::Submitting`], returning the
    /// draft to hand to the gateway.
    ///
    /// # Errors
    ///
    /// - [`FunnelError::SubmissionInFlight`] while a submission is
    ///   outstanding.
    /// - [`FunnelError::InvalidTransition`] from a step that cannot submit.
    /// - [`FunnelError::Invalid`] when any field fails.
    pub fn begin_submit(&mut self) -> Result<LeadDraft, FunnelError> {
        if self.step == Step::Submitting {
            return Err(FunnelError::SubmissionInFlight);
        }
        if self.step != self.submit_step() {
            return Err(self.invalid_transition("submit"));
        }
        self.touched.extend(Field::ALL);
        self.revalidate();
        self.schema
            .validate(&self.form)
            .map_err(FunnelError::Invalid)?;

        self.resume_step = self.step;
        self.step = Step::Submitting;
        Ok(LeadDraft {
            name: self.form.name.clone(),
            email: self.form.email.clone(),
            phone: Some(self.form.phone.clone()),
            lead_source: None,
            consent: self.form.consent,
            downloaded: None,
        })
    }

    /// Apply the gateway's answer to an outstanding submission.
    ///
    /// On success the funnel reaches [`Step::Success`] and holds the lead.
    /// On failure it returns to the step the submission started from with
    /// every value intact and an error notice queued.
    ///
    /// # Errors
    ///
    /// - [`FunnelError::InvalidTransition`] if no submission is outstanding.
    /// - [`FunnelError::Submission`] carrying the gateway's error.
    pub fn complete_submit(
        &mut self,
        result: Result<Lead, GatewayError>,
    ) -> Result<&Lead, FunnelError> {
        if self.step != Step::Submitting {
            return Err(self.invalid_transition("complete a submission"));
        }
        match result {
            Ok(lead) => {
                self.step = Step::Success;
                self.errors = FieldErrors::new();
                self.notices.push_back(Notice::success(SUCCESS_NOTICE));
                Ok(&*self.lead.insert(lead))
            }
            Err(e) => {
                self.step = self.resume_step;
                if let GatewayError::Validation(errors) = &e {
                    self.errors = errors.clone();
                }
                self.notices.push_back(Notice::error(e.user_message()));
                Err(FunnelError::Submission(e))
            }
        }
    }

    /// Submit through `gateway`. The only path that creates a lead.
    ///
    /// # Errors
    ///
    /// See [`Funnel::begin_submit`] and [`Funnel::complete_submit`].
    pub async fn submit(&mut self, gateway: &SubmissionGateway) -> Result<&Lead, FunnelError> {
        let draft = self.begin_submit()?;
        let result = gateway.submit(draft).await;
        self.complete_submit(result)
    }

    /// Pop the oldest pending notice.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    /// Mark a download as in flight and return the lead to record it for.
    ///
    /// # Errors
    ///
    /// - [`FunnelError::InvalidTransition`] before [`Step::Success`].
    /// - [`FunnelError::DownloadInFlight`] while a download is outstanding.
    pub fn begin_download(&mut self) -> Result<Lead, FunnelError> {
        let Some(lead) = self.lead.clone().filter(|_| self.step == Step::Success) else {
            return Err(self.invalid_transition("download"));
        };
        if self.downloading {
            return Err(FunnelError::DownloadInFlight);
        }
        self.downloading = true;
        Ok(lead)
    }

    /// Clear the in-flight download. When the backend recorded it, the held
    /// lead mirrors `downloaded = true`.
    pub fn finish_download(&mut self, recorded: bool) {
        self.downloading = false;
        if recorded {
            if let Some(lead) = self.lead.as_mut() {
                lead.mark_downloaded();
            }
        }
    }

    /// Run `trigger` for this funnel's lead.
    ///
    /// # Errors
    ///
    /// See [`Funnel::begin_download`].
    pub async fn download(
        &mut self,
        trigger: &DownloadTrigger,
    ) -> Result<DownloadTicket, FunnelError> {
        let lead = self.begin_download()?;
        let ticket = trigger.trigger(&lead).await;
        self.finish_download(ticket.recorded);
        Ok(ticket)
    }

    fn submit_step(&self) -> Step {
        match self.flow {
            FlowVariant::Staged => Step::CollectingContactConsent,
            FlowVariant::Collapsed => Step::CollectingBasicInfo,
        }
    }

    fn ensure_editable(&self) -> Result<(), FunnelError> {
        if self.step.is_editable() {
            Ok(())
        } else {
            Err(FunnelError::NotEditable { step: self.step })
        }
    }

    fn invalid_transition(&self, action: &'static str) -> FunnelError {
        FunnelError::InvalidTransition {
            from: self.step,
            action,
        }
    }

    fn write_field(&mut self, value: FieldValue) {
        self.touched.insert(value.field());
        match value {
            FieldValue::Name(v) => self.form.name = v,
            FieldValue::Email(v) => self.form.email = v,
            FieldValue::Phone(v) => self.form.phone = v,
            FieldValue::Consent(v) => self.form.consent = v,
        }
    }

    fn revalidate(&mut self) {
        let touched: Vec<Field> = self.touched.iter().copied().collect();
        self.errors = self
            .schema
            .validate_fields(&self.form, &touched)
            .err()
            .unwrap_or_default();
    }
}
