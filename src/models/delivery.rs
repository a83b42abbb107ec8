//! Delivery bookkeeping types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Notice;

/// A send that failed and waits for the retry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDelivery {
    pub notice: Notice,
    pub destination: String,
    /// Attempts made so far, the failed first send counts as 1
    pub attempts: u32,
}

/// Outcome of a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The send failed and the notice was queued for retry
    Queued,
}

/// Summary of delivering a batch of new notices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub delivered: usize,
    pub queued: usize,
}

/// Summary of one retry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    /// Entries dropped after reaching the attempt cap
    pub abandoned: usize,
}

/// Summary of one ingestion cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Raw records returned by the source
    pub fetched: usize,
    /// Notices kept after normalization
    pub cached: usize,
    /// Notices not present in the ledger
    pub new: usize,
    pub delivery: BatchReport,
}

/// Summary of a refresh that only replaced the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub fetched: usize,
    pub total: usize,
    pub updated_at: Option<DateTime<Utc>>,
}
