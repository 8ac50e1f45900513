//! Declarative field rules for the lead form.
//!
//! Validation is synchronous and pure: it looks at the current field values
//! and either accepts them or returns one [`FieldError`] per failing field.
//! The step controller runs it on every field change and again on every
//! transition attempt.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use leadfunnel_store::LeadDraft;
use regex::Regex;

use crate::policy::ConsentPolicy;

/// Minimum length of a name, in characters.
pub const NAME_MIN_CHARS: usize = 2;

/// `local@domain.tld`, with the leading-dot and double-dot rules checked
/// separately because the regex engine has no look-around.
#[allow(clippy::expect_used)]
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern is a valid literal regex")
});

/// A form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Email,
    Phone,
    Consent,
}

impl Field {
    /// Every field, in display order.
    pub const ALL: [Self; 4] = [Self::Name, Self::Email, Self::Phone, Self::Consent];

    /// Form-encoding name of the field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Consent => "consent",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single field was rejected. `Display` is the visitor-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Name must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Please enter a valid email address")]
    InvalidFormat,

    #[error("You must agree to receive communications")]
    ConsentRequired,
}

/// Failing fields and their errors, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, FieldError>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, error: FieldError) {
        self.0.insert(field, error);
    }

    pub fn remove(&mut self, field: Field) {
        self.0.remove(&field);
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<FieldError> {
        self.0.get(&field).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, FieldError)> + '_ {
        self.0.iter().map(|(f, e)| (*f, *e))
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {error}")?;
            first = false;
        }
        Ok(())
    }
}

/// Current values of the form, exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub consent: bool,
}

impl From<&LeadDraft> for LeadForm {
    fn from(draft: &LeadDraft) -> Self {
        Self {
            name: draft.name.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone().unwrap_or_default(),
            consent: draft.consent,
        }
    }
}

/// Name rule: at least [`NAME_MIN_CHARS`] characters.
///
/// # Errors
///
/// Returns [`FieldError::TooShort`] for shorter names.
pub fn validate_name(name: &str) -> Result<(), FieldError> {
    if name.chars().count() < NAME_MIN_CHARS {
        return Err(FieldError::TooShort {
            min: NAME_MIN_CHARS,
        });
    }
    Ok(())
}

/// Email rule: `local@domain.tld` syntax.
///
/// # Errors
///
/// Returns [`FieldError::InvalidFormat`] when the address does not match.
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.starts_with('.') || email.contains("..") || !EMAIL_PATTERN.is_match(email) {
        return Err(FieldError::InvalidFormat);
    }
    Ok(())
}

/// The rule set for one deployment. Only consent handling varies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSchema {
    consent: ConsentPolicy,
}

impl ValidationSchema {
    #[must_use]
    pub fn new(consent: ConsentPolicy) -> Self {
        Self { consent }
    }

    #[must_use]
    pub fn consent_policy(&self) -> ConsentPolicy {
        self.consent
    }

    /// Consent rule under this schema's policy.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::ConsentRequired`] when consent is required and
    /// not given.
    pub fn validate_consent(&self, consent: bool) -> Result<(), FieldError> {
        match self.consent {
            ConsentPolicy::Required if !consent => Err(FieldError::ConsentRequired),
            _ => Ok(()),
        }
    }

    /// Check a single field. Phone is never rejected.
    ///
    /// # Errors
    ///
    /// Returns the field's [`FieldError`] when it fails.
    pub fn validate_field(&self, form: &LeadForm, field: Field) -> Result<(), FieldError> {
        match field {
            Field::Name => validate_name(&form.name),
            Field::Email => validate_email(&form.email),
            Field::Phone => Ok(()),
            Field::Consent => self.validate_consent(form.consent),
        }
    }

    /// Check a subset of fields.
    ///
    /// # Errors
    ///
    /// Returns every failing field among `fields`.
    pub fn validate_fields(&self, form: &LeadForm, fields: &[Field]) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for &field in fields {
            if let Err(e) = self.validate_field(form, field) {
                errors.insert(field, e);
            }
        }
        errors.into_result()
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self, form: &LeadForm) -> Result<(), FieldErrors> {
        self.validate_fields(form, &Field::ALL)
    }

    /// Check a draft headed for the backend.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate_draft(&self, draft: &LeadDraft) -> Result<(), FieldErrors> {
        self.validate(&LeadForm::from(draft))
    }
}
