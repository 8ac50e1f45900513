//! In-memory lead store for tests and local development.
//!
//! Stores leads in a `BTreeMap` behind a `RwLock`. Nothing is persisted;
//! all leads are lost when the process exits. Ids are random UUIDs and
//! `created_at` is the insert time, the same columns a hosted backend fills.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{Lead, LeadId, LeadStore, NewLead, StoreError};

/// An in-memory lead collection.
///
/// Clones share the same underlying map.
///
/// # Examples
///
/// ```
/// # use leadfunnel_store::{LeadDraft, LeadStore, MemoryStore};
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryStore::new();
/// let draft = LeadDraft { name: "Jo Lee".into(), email: "jo@example.com".into(), ..Default::default() };
/// let rows = store.insert(&draft.into_new_lead("website")).await.unwrap();
/// assert_eq!(rows.len(), 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    leads: Arc<RwLock<BTreeMap<LeadId, Lead>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a lead by id.
    pub async fn get(&self, id: &LeadId) -> Option<Lead> {
        self.leads.read().await.get(id).cloned()
    }

    /// Snapshot of every stored lead, ordered by id.
    pub async fn leads(&self) -> Vec<Lead> {
        self.leads.read().await.values().cloned().collect()
    }

    /// Number of stored leads.
    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    /// Whether the store holds no leads.
    pub async fn is_empty(&self) -> bool {
        self.leads.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl LeadStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, lead: &NewLead) -> Result<Vec<Lead>, StoreError> {
        let row = Lead::from_insert(LeadId::generate(), Utc::now(), lead.clone());
        self.leads
            .write()
            .await
            .insert(row.id().clone(), row.clone());
        Ok(vec![row])
    }

    async fn mark_downloaded(&self, id: &LeadId) -> Result<(), StoreError> {
        let mut leads = self.leads.write().await;
        let lead = leads.get_mut(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;
        lead.mark_downloaded();
        Ok(())
    }
}
