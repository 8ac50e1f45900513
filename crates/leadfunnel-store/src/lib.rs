//! Lead persistence for `leadfunnel`.
//!
//! This crate defines the [`Lead`] record shared by every other crate and the
//! [`LeadStore`] trait, the narrow data-submission contract the funnel has
//! with its hosted backend. It knows nothing about forms, validation, or
//! steps; callers validate before they insert.
//!
//! Two implementations are provided:
//!
//! - [`PostgrestStore`]: production default, talks to a hosted PostgREST
//!   endpoint such as Supabase (feature `postgrest`)
//! - [`MemoryStore`]: in-memory, for tests and local development

mod error;
mod lead;
mod memory;
#[cfg(feature = "postgrest")]
mod postgrest;

pub use error::StoreError;
pub use lead::{Lead, LeadDraft, LeadId, NewLead};
pub use memory::MemoryStore;
#[cfg(feature = "postgrest")]
pub use postgrest::{PostgrestConfig, PostgrestStore};

/// A hosted lead collection.
///
/// Mirrors two backend calls:
///
/// - `INSERT INTO leads (...) VALUES (...) RETURNING *`
/// - `UPDATE leads SET downloaded = true WHERE id = :id`
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait LeadStore: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Insert one lead and return the rows the backend reports back.
    ///
    /// A well-behaved backend returns exactly one row carrying the assigned
    /// `id` and `created_at`. Callers decide what zero or several rows mean;
    /// this layer passes them through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend is unreachable, misconfigured,
    /// or rejects the row.
    async fn insert(&self, lead: &NewLead) -> Result<Vec<Lead>, StoreError>;

    /// Set `downloaded = true` on the lead with the given id.
    ///
    /// Idempotent: marking an already-downloaded lead is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend call fails.
    async fn mark_downloaded(&self, id: &LeadId) -> Result<(), StoreError>;

    /// Whether connection parameters were supplied.
    ///
    /// An unconfigured store still accepts calls; they fail with
    /// [`StoreError::NotConfigured`].
    fn is_configured(&self) -> bool {
        true
    }
}
