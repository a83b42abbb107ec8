//! Delivery queue and retrier.
//!
//! Sends go out one at a time, never closer together than the pacing
//! interval, and each is bounded by a timeout. A failed send is parked in
//! the pending list; the retry sweep works through that list later.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{
    BatchReport, DeliveryConfig, DeliveryOutcome, Notice, PendingDelivery, SweepReport,
};
use crate::services::Transport;

pub struct DeliveryQueue {
    transport: Arc<dyn Transport>,
    template: String,
    pacing: Duration,
    timeout: Duration,
    max_attempts: u32,
    pending: Vec<PendingDelivery>,
    last_send: Option<Instant>,
}

impl DeliveryQueue {
    /// Create a queue; `timeout` bounds every transport call.
    pub fn new(transport: Arc<dyn Transport>, settings: &DeliveryConfig, timeout: Duration) -> Self {
        Self {
            transport,
            template: settings.template.clone(),
            pacing: settings.pacing(),
            timeout,
            max_attempts: settings.max_attempts.max(1),
            pending: Vec::new(),
            last_send: None,
        }
    }

    /// Sends waiting for the next sweep, in insertion order.
    pub fn pending(&self) -> &[PendingDelivery] {
        &self.pending
    }

    /// Send one notice. A failure queues it for retry instead of returning an error.
    pub async fn deliver(&mut self, notice: &Notice, destination: &str) -> DeliveryOutcome {
        match self.send(notice, destination).await {
            Ok(()) => {
                log::info!("Notice delivered: {}", notice.title);
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                log::error!("Failed to deliver notice {:?}: {}", notice.title, e);
                self.pending.push(PendingDelivery {
                    notice: notice.clone(),
                    destination: destination.to_string(),
                    attempts: 1,
                });
                DeliveryOutcome::Queued
            }
        }
    }

    /// Deliver notices in the given order.
    pub async fn deliver_batch(&mut self, notices: &[Notice], destination: &str) -> BatchReport {
        let mut report = BatchReport::default();
        for notice in notices {
            match self.deliver(notice, destination).await {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::Queued => report.queued += 1,
            }
        }
        report
    }

    /// Retry every pending send once.
    ///
    /// An entry that fails again is kept while it has attempts left and is
    /// dropped with a warning once it reaches the cap.
    pub async fn retry_pending(&mut self) -> SweepReport {
        let mut report = SweepReport::default();
        if self.pending.is_empty() {
            return report;
        }

        let entries = std::mem::take(&mut self.pending);
        log::info!("Retrying {} pending deliveries", entries.len());

        for mut entry in entries {
            report.attempted += 1;
            match self.send(&entry.notice, &entry.destination).await {
                Ok(()) => {
                    log::info!("Pending notice delivered: {}", entry.notice.title);
                    report.delivered += 1;
                }
                Err(e) => {
                    entry.attempts += 1;
                    if entry.attempts < self.max_attempts {
                        log::warn!(
                            "Retry {} of {:?} failed: {}",
                            entry.attempts,
                            entry.notice.title,
                            e
                        );
                        report.requeued += 1;
                        self.pending.push(entry);
                    } else {
                        log::warn!(
                            "Abandoning notice {:?} after {} attempts: {}",
                            entry.notice.title,
                            entry.attempts,
                            e
                        );
                        report.abandoned += 1;
                    }
                }
            }
        }

        report
    }

    /// Format and hand one notice to the transport, honoring pacing and the timeout.
    async fn send(&mut self, notice: &Notice, destination: &str) -> Result<()> {
        if let Some(last) = self.last_send {
            tokio::time::sleep_until(last + self.pacing).await;
        }

        let message = notice.format(&self.template);
        let result =
            match tokio::time::timeout(self.timeout, self.transport.send(&message, destination))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::timeout(
                    format!("send to {destination}"),
                    self.timeout.as_secs(),
                )),
            };

        self.last_send = Some(Instant::now());
        result
    }
}
