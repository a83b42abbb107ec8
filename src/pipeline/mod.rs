//! Ingestion and delivery pipeline.
//!
//! - `fingerprint`: content identity of a notice
//! - `ordering`: chronological comparator for notice dates
//! - `ledger`: persistent set of delivered fingerprints
//! - `delivery`: paced sends with a retry list
//! - `cache`: snapshot served by the query API
//! - `pipeline`: one ingestion cycle end to end
//! - `scheduler`: the task that drives the pipeline over time

pub mod cache;
pub mod delivery;
pub mod fingerprint;
pub mod ledger;
pub mod ordering;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod scheduler;

pub use cache::{CacheSnapshot, CacheStats, NoticeCache, NoticeFilter, QueryResult};
pub use delivery::DeliveryQueue;
pub use fingerprint::{Fingerprint, fingerprint, fingerprint_fields};
pub use ledger::DedupLedger;
pub use ordering::{compare_chronological, parse_notice_date, sort_ascending, sort_descending};
pub use pipeline::Pipeline;
pub use scheduler::{Scheduler, SchedulerHandle};
