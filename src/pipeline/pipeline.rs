// src/pipeline/pipeline.rs

//! Ingestion cycle: fetch, normalize, cache, dedup, deliver, persist.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Config, CycleReport, RefreshReport, SweepReport};
use crate::services::{HttpNoticeSource, HttpTransport, NoticeSource, Transport, normalize_batch};
use crate::storage::{LedgerStore, LocalStorage};

use super::cache::{CacheSnapshot, NoticeCache};
use super::delivery::DeliveryQueue;
use super::ledger::DedupLedger;

/// Owns the ledger and the pending list; everything that mutates them goes
/// through `&mut self`.
pub struct Pipeline {
    source: Arc<dyn NoticeSource>,
    ledger: DedupLedger,
    queue: DeliveryQueue,
    cache: Arc<NoticeCache>,
    destination: String,
    last_run: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn NoticeSource>,
        ledger: DedupLedger,
        queue: DeliveryQueue,
        cache: Arc<NoticeCache>,
        destination: impl Into<String>,
    ) -> Self {
        let pipeline = Self {
            source,
            ledger,
            queue,
            cache,
            destination: destination.into(),
            last_run: None,
        };
        pipeline.publish_counts();
        pipeline
    }

    /// Wire the HTTP source, HTTP transport and file ledger from configuration.
    pub async fn from_config(config: &Config, cache: Arc<NoticeCache>) -> Result<Self> {
        let source: Arc<dyn NoticeSource> = Arc::new(HttpNoticeSource::new(&config.source)?);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.transport)?);
        let store: Arc<dyn LedgerStore> =
            Arc::new(LocalStorage::new(config.storage.ledger_path.clone()));

        let ledger = DedupLedger::load(store).await;
        let queue = DeliveryQueue::new(transport, &config.delivery, config.transport.timeout());

        Ok(Self::new(
            source,
            ledger,
            queue,
            cache,
            config.delivery.destination.clone(),
        ))
    }

    /// Fetch and normalize the current batch, then swap it into the cache.
    async fn ingest(&mut self) -> Result<(usize, Arc<CacheSnapshot>)> {
        let raw = self.source.fetch().await?;
        let fetched = raw.len();

        let notices = normalize_batch(raw);
        if notices.len() < fetched {
            log::debug!(
                "Dropped {} notices without a usable date",
                fetched - notices.len()
            );
        }

        let snapshot = self.cache.replace(notices);
        self.last_run = snapshot.updated_at;
        log::info!("Cache updated with {} notices", snapshot.notices.len());
        Ok((fetched, snapshot))
    }

    /// Replace the cache without touching the ledger or delivering anything.
    pub async fn refresh(&mut self) -> Result<RefreshReport> {
        let (fetched, snapshot) = self.ingest().await?;
        Ok(RefreshReport {
            fetched,
            total: snapshot.notices.len(),
            updated_at: snapshot.updated_at,
        })
    }

    /// Run one full ingestion cycle.
    ///
    /// A fetch failure aborts the cycle before the ledger is touched. A
    /// persist failure is logged; the in-memory ledger stays authoritative
    /// until the next successful write.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let (fetched, snapshot) = self.ingest().await?;

        let fresh = self.ledger.mark_and_filter_new(&snapshot.notices);
        log::info!("{} new notices to deliver", fresh.len());

        let delivery = self.queue.deliver_batch(&fresh, &self.destination).await;

        if let Err(e) = self.ledger.persist().await {
            log::error!("Failed to persist ledger: {}", e);
        }
        self.publish_counts();

        Ok(CycleReport {
            fetched,
            cached: snapshot.notices.len(),
            new: fresh.len(),
            delivery,
        })
    }

    /// Retry every pending delivery once.
    pub async fn retry_sweep(&mut self) -> SweepReport {
        let report = self.queue.retry_pending().await;
        self.publish_counts();
        report
    }

    /// Write the ledger to its store.
    pub async fn persist(&self) -> Result<()> {
        self.ledger.persist().await
    }

    pub fn cache(&self) -> &Arc<NoticeCache> {
        &self.cache
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Time of the last successful fetch.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    fn publish_counts(&self) {
        self.cache
            .record_counts(self.ledger.len(), self.queue.pending().len());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{DeliveryConfig, RawNotice};
    use crate::pipeline::fingerprint_fields;
    use crate::test_support::{MemoryStore, RecordingTransport, StaticSource, raw_notice};

    struct Harness {
        source: Arc<StaticSource>,
        transport: Arc<RecordingTransport>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new(batch: Vec<RawNotice>) -> Self {
            Self {
                source: Arc::new(StaticSource::new(batch)),
                transport: Arc::new(RecordingTransport::new()),
                store: Arc::new(MemoryStore::default()),
            }
        }

        /// Build a pipeline over the shared doubles, reloading the ledger.
        async fn pipeline(&self) -> Pipeline {
            let settings = DeliveryConfig {
                pacing_ms: 0,
                max_attempts: 3,
                ..DeliveryConfig::default()
            };
            let ledger = DedupLedger::load(self.store.clone()).await;
            let queue =
                DeliveryQueue::new(self.transport.clone(), &settings, Duration::from_secs(5));
            Pipeline::new(
                self.source.clone(),
                ledger,
                queue,
                Arc::new(NoticeCache::new()),
                "dest@newsletter",
            )
        }
    }

    fn batch() -> Vec<RawNotice> {
        vec![
            raw_notice("Redes", "tercero", "03/01/2024 10:00", "<p>c</p>"),
            raw_notice("Redes", "primero", "01/01/2024", "<p>a</p>"),
            raw_notice("Redes", "segundo", "02/01/2024", "<p>b</p>"),
        ]
    }

    #[tokio::test]
    async fn test_cycle_delivers_oldest_first() {
        let harness = Harness::new(batch());
        let mut pipeline = harness.pipeline().await;

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.cached, 3);
        assert_eq!(report.new, 3);
        assert_eq!(report.delivery.delivered, 3);

        assert_eq!(
            harness.transport.delivered_titles(),
            vec!["primero", "segundo", "tercero"]
        );
        let destinations: Vec<_> = harness.transport.sent().into_iter().map(|(_, d)| d).collect();
        assert!(destinations.iter().all(|d| d == "dest@newsletter"));
    }

    #[tokio::test]
    async fn test_cache_holds_newest_first() {
        let harness = Harness::new(batch());
        let mut pipeline = harness.pipeline().await;
        pipeline.run_cycle().await.unwrap();

        let snapshot = pipeline.cache().snapshot();
        let titles: Vec<_> = snapshot.notices.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["tercero", "segundo", "primero"]);
        assert!(pipeline.last_run().is_some());
    }

    #[tokio::test]
    async fn test_second_cycle_delivers_nothing() {
        let harness = Harness::new(batch());
        let mut pipeline = harness.pipeline().await;
        pipeline.run_cycle().await.unwrap();

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.new, 0);
        assert_eq!(harness.transport.attempts(), 3);
    }

    #[tokio::test]
    async fn test_restart_does_not_redeliver() {
        let harness = Harness::new(batch());
        let mut first = harness.pipeline().await;
        first.run_cycle().await.unwrap();
        drop(first);

        let mut second = harness.pipeline().await;
        assert_eq!(second.ledger().len(), 3);

        harness.source.set_batch({
            let mut next = batch();
            next.push(raw_notice("Redes", "cuarto", "04/01/2024", ""));
            next
        });
        let report = second.run_cycle().await.unwrap();
        assert_eq!(report.new, 1);
        assert_eq!(
            harness.transport.delivered_titles(),
            vec!["primero", "segundo", "tercero", "cuarto"]
        );
    }

    #[tokio::test]
    async fn test_missing_date_never_cached_or_fingerprinted() {
        let mut undated = raw_notice("Redes", "sin fecha", "", "x");
        undated.date = None;
        let harness = Harness::new(vec![undated, raw_notice("Redes", "ok", "01/01/2024", "")]);
        let mut pipeline = harness.pipeline().await;

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.cached, 1);
        assert_eq!(pipeline.ledger().len(), 1);
        assert!(!pipeline
            .ledger()
            .contains(&fingerprint_fields("Redes", "sin fecha", "")));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_state_and_next_cycle_runs() {
        let harness = Harness::new(batch());
        let mut pipeline = harness.pipeline().await;
        harness.source.set_failing(true);

        assert!(pipeline.run_cycle().await.is_err());
        assert!(pipeline.cache().snapshot().notices.is_empty());
        assert!(pipeline.ledger().is_empty());
        assert_eq!(harness.store.saves(), 0);

        harness.source.set_failing(false);
        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.delivery.delivered, 3);
        assert_eq!(harness.source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_failed_send_retried_by_sweep() {
        let harness = Harness::new(batch());
        harness.transport.fail_containing("segundo");
        let mut pipeline = harness.pipeline().await;

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.delivery.queued, 1);
        assert_eq!(pipeline.queue().pending().len(), 1);
        assert_eq!(pipeline.cache().stats().pending, 1);

        harness.transport.heal();
        let sweep = pipeline.retry_sweep().await;
        assert_eq!(sweep.delivered, 1);
        assert!(pipeline.queue().pending().is_empty());
        assert_eq!(pipeline.cache().stats().pending, 0);
    }

    #[tokio::test]
    async fn test_refresh_leaves_ledger_alone() {
        let harness = Harness::new(batch());
        let mut pipeline = harness.pipeline().await;

        let report = pipeline.refresh().await.unwrap();
        assert_eq!(report.total, 3);
        assert!(report.updated_at.is_some());
        assert!(pipeline.ledger().is_empty());
        assert_eq!(harness.transport.attempts(), 0);
        assert_eq!(harness.store.saves(), 0);
    }

    #[tokio::test]
    async fn test_cycle_persists_ledger() {
        let harness = Harness::new(batch());
        let mut pipeline = harness.pipeline().await;
        pipeline.run_cycle().await.unwrap();

        let saved = harness.store.saved().unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(pipeline.cache().stats().delivered, 3);
    }
}
