//! In-memory notice cache read by the query API.
//!
//! Each ingestion replaces the whole snapshot. Readers hold an `Arc` to the
//! snapshot they loaded, so they see either the previous batch or the new
//! one, never a mix.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Notice;

/// A point-in-time batch of normalized notices, newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheSnapshot {
    pub notices: Vec<Notice>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Optional filters for a cache query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoticeFilter {
    /// Case-insensitive substring of the subject
    pub subject: Option<String>,
    /// Prefix of the `DD/MM/YYYY` date
    pub date: Option<String>,
}

impl NoticeFilter {
    pub fn matches(&self, notice: &Notice) -> bool {
        let subject_ok = match self.subject.as_deref().filter(|s| !s.is_empty()) {
            Some(subject) => notice
                .subject
                .to_lowercase()
                .contains(&subject.to_lowercase()),
            None => true,
        };
        let date_ok = match self.date.as_deref().filter(|d| !d.is_empty()) {
            Some(prefix) => notice.date.starts_with(prefix),
            None => true,
        };
        subject_ok && date_ok
    }
}

/// Result of a cache query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub total: usize,
    pub updated_at: Option<DateTime<Utc>>,
    pub notices: Vec<Notice>,
}

/// Counters published for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_notices: usize,
    pub delivered: usize,
    pub pending: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct NoticeCache {
    snapshot: ArcSwap<CacheSnapshot>,
    delivered: AtomicUsize,
    pending: AtomicUsize,
}

impl NoticeCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(CacheSnapshot::default()),
            delivered: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.snapshot.load_full()
    }

    /// Swap in a new batch and return it.
    pub fn replace(&self, notices: Vec<Notice>) -> Arc<CacheSnapshot> {
        let snapshot = Arc::new(CacheSnapshot {
            notices,
            updated_at: Some(Utc::now()),
        });
        self.snapshot.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Filter the current snapshot, keeping its newest-first order.
    pub fn query(&self, filter: &NoticeFilter) -> QueryResult {
        let snapshot = self.snapshot();
        let notices: Vec<Notice> = snapshot
            .notices
            .iter()
            .filter(|notice| filter.matches(notice))
            .cloned()
            .collect();

        QueryResult {
            total: notices.len(),
            updated_at: snapshot.updated_at,
            notices,
        }
    }

    /// Publish ledger and pending list sizes.
    pub fn record_counts(&self, delivered: usize, pending: usize) {
        self.delivered.store(delivered, Ordering::Relaxed);
        self.pending.store(pending, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot();
        CacheStats {
            total_notices: snapshot.notices.len(),
            delivered: self.delivered.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            updated_at: snapshot.updated_at,
        }
    }
}

impl Default for NoticeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(subject: &str, date: &str) -> Notice {
        Notice::from_parts(subject, "Aviso", date, "", "").unwrap()
    }

    fn filled_cache() -> NoticeCache {
        let cache = NoticeCache::new();
        cache.replace(vec![
            notice("Redes y Comunicaciones", "03/01/2024 10:00"),
            notice("Algoritmos I", "02/01/2024"),
            notice("Redes Avanzadas", "15/12/2023"),
        ]);
        cache
    }

    #[test]
    fn test_empty_cache() {
        let cache = NoticeCache::new();
        let result = cache.query(&NoticeFilter::default());
        assert_eq!(result.total, 0);
        assert!(result.updated_at.is_none());
    }

    #[test]
    fn test_subject_filter_case_insensitive() {
        let cache = filled_cache();
        let result = cache.query(&NoticeFilter {
            subject: Some("REDES".to_string()),
            date: None,
        });
        let dates: Vec<_> = result.notices.iter().map(|n| n.date.as_str()).collect();
        assert_eq!(dates, vec!["03/01/2024 10:00", "15/12/2023"]);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn test_date_prefix_filter() {
        let cache = filled_cache();
        let result = cache.query(&NoticeFilter {
            subject: None,
            date: Some("02/01".to_string()),
        });
        assert_eq!(result.total, 1);
        assert_eq!(result.notices[0].subject, "Algoritmos I");
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let cache = filled_cache();
        let result = cache.query(&NoticeFilter {
            subject: Some(String::new()),
            date: Some(String::new()),
        });
        assert_eq!(result.total, 3);
    }

    #[test]
    fn test_replace_swaps_whole_snapshot() {
        let cache = filled_cache();
        let before = cache.snapshot();

        cache.replace(vec![notice("Otra", "01/01/2024")]);

        assert_eq!(before.notices.len(), 3);
        assert_eq!(cache.snapshot().notices.len(), 1);
        assert_eq!(cache.stats().total_notices, 1);
    }

    #[test]
    fn test_stats_counters() {
        let cache = filled_cache();
        cache.record_counts(42, 2);
        let stats = cache.stats();
        assert_eq!(stats.delivered, 42);
        assert_eq!(stats.pending, 2);
        assert!(stats.updated_at.is_some());
    }
}
