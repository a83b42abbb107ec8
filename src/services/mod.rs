//! Service layer for the relay.
//!
//! This module contains the collaborators around the pipeline:
//! - Notice normalization (`normalize_batch`)
//! - Notice list fetching (`NoticeSource`, `HttpNoticeSource`)
//! - Message delivery (`Transport`, `HttpTransport`)

pub mod normalizer;
mod source;
mod transport;

pub use normalizer::{normalize_batch, normalize_body, normalize_notice};
pub use source::{HttpNoticeSource, NoticeSource, parse_payload};
pub use transport::{HttpTransport, Transport};
