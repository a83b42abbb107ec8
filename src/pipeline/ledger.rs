//! Dedup ledger: fingerprints of notices that were already accepted for delivery.
//!
//! The set only grows. It is read once at startup and written whole after
//! each delivery pass and on shutdown.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Notice;
use crate::pipeline::fingerprint::{Fingerprint, fingerprint};
use crate::pipeline::ordering::sort_ascending;
use crate::storage::LedgerStore;

pub struct DedupLedger {
    seen: HashSet<Fingerprint>,
    store: Arc<dyn LedgerStore>,
}

impl DedupLedger {
    /// Load the persisted set.
    ///
    /// A missing store yields an empty ledger. An unreadable or corrupt one
    /// is logged and also yields an empty ledger, at the cost of possibly
    /// re-sending old notices.
    pub async fn load(store: Arc<dyn LedgerStore>) -> Self {
        let seen: HashSet<Fingerprint> = match store.load().await {
            Ok(Some(fingerprints)) => fingerprints.into_iter().collect(),
            Ok(None) => {
                log::info!("No ledger at {}, starting empty", store.location());
                HashSet::new()
            }
            Err(e) => {
                log::error!("Failed to load ledger, starting empty: {}", e);
                HashSet::new()
            }
        };

        if !seen.is_empty() {
            log::info!(
                "Loaded {} delivered fingerprints from {}",
                seen.len(),
                store.location()
            );
        }

        Self { seen, store }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record every unseen notice and return those, oldest first.
    ///
    /// A notice repeated within `notices` is returned once.
    pub fn mark_and_filter_new(&mut self, notices: &[Notice]) -> Vec<Notice> {
        let mut fresh: Vec<Notice> = notices
            .iter()
            .filter(|notice| self.seen.insert(fingerprint(notice)))
            .cloned()
            .collect();

        sort_ascending(&mut fresh);
        fresh
    }

    /// Write the whole set to the store, sorted for stable output.
    pub async fn persist(&self) -> Result<()> {
        let mut fingerprints: Vec<Fingerprint> = self.seen.iter().cloned().collect();
        fingerprints.sort();
        self.store.save(&fingerprints).await
    }
}
