// src/models/mod.rs

//! Domain models for the relay.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod delivery;
mod notice;

// Re-export all public types
pub use config::{
    Config, DeliveryConfig, LoggingConfig, ScheduleConfig, ServerConfig, SourceConfig,
    StorageConfig, TransportConfig,
};
pub use delivery::{
    BatchReport, CycleReport, DeliveryOutcome, PendingDelivery, RefreshReport, SweepReport,
};
pub use notice::{Notice, NoticeBatch, RawNotice, UNSPECIFIED_AUTHOR, UNTITLED};

pub(crate) use notice::{author_or_default, title_or_default};
