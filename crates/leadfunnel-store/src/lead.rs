//! The lead record and its pre-persistence shapes.
//!
//! A lead moves through three types:
//!
//! - [`LeadDraft`]: what the form produces; anything may be missing.
//! - [`NewLead`]: a draft with defaults applied, ready for the backend.
//! - [`Lead`]: a persisted row. It always carries the backend-assigned
//!   [`LeadId`] and `created_at`, and the id can never be changed.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend-assigned lead identifier.
///
/// Hosted backends hand out either UUIDs or integer keys, so the id is kept
/// as its textual form. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LeadId(String);

impl LeadId {
    /// Wrap a backend id. Returns `None` for an empty or blank string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// A fresh random id, as assigned by [`MemoryStore`](crate::MemoryStore).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LeadId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        let raw = match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        };
        Self::new(raw).ok_or_else(|| serde::de::Error::custom("lead id must not be empty"))
    }
}

/// Candidate lead as collected from the visitor. No id, no timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadDraft {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Campaign tag; the gateway fills in its configured tag when absent.
    pub lead_source: Option<String>,
    pub consent: bool,
    /// Defaults to `false` when absent.
    pub downloaded: Option<bool>,
}

impl LeadDraft {
    /// Apply field defaults and produce the insert payload.
    ///
    /// A blank phone number is dropped rather than stored as `""`.
    #[must_use]
    pub fn into_new_lead(self, default_source: &str) -> NewLead {
        let phone = self
            .phone
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty());
        let lead_source = self
            .lead_source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_source.to_owned());

        NewLead {
            name: self.name,
            email: self.email,
            phone,
            lead_source,
            consent: self.consent,
            downloaded: self.downloaded.unwrap_or(false),
        }
    }
}

/// Insert payload: one row of the `leads` collection minus backend-owned
/// columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub lead_source: String,
    pub consent: bool,
    pub downloaded: bool,
}

/// A persisted lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    id: LeadId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub lead_source: String,
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    downloaded: bool,
    /// Insert time. A `timestamp` column without a zone is read as UTC, and
    /// a row without the column gets the time it was decoded.
    #[serde(default = "Utc::now", deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
}

fn deserialize_created_at<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(Utc::now()),
        Some(raw) => parse_timestamp(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognised created_at timestamp '{raw}'"))
        }),
    }
}

/// Parse the timestamp spellings PostgREST emits for `timestamptz` and
/// `timestamp` columns.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

impl Lead {
    /// Build the row a backend would return for `new` after assigning `id`
    /// and `created_at`.
    #[must_use]
    pub fn from_insert(id: LeadId, created_at: DateTime<Utc>, new: NewLead) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            lead_source: new.lead_source,
            consent: new.consent,
            downloaded: new.downloaded,
            created_at,
        }
    }

    /// The backend-assigned id.
    #[must_use]
    pub fn id(&self) -> &LeadId {
        &self.id
    }

    /// Whether the visitor has triggered the resource download.
    #[must_use]
    pub fn downloaded(&self) -> bool {
        self.downloaded
    }

    /// Flip `downloaded` to true. Repeated calls are no-ops.
    pub fn mark_downloaded(&mut self) {
        self.downloaded = true;
    }
}
