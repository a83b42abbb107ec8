//! Chronological ordering of notices.
//!
//! Dates are published as `DD/MM/YYYY` with an optional `HH:MM` time; a
//! missing time means midnight.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::Notice;

const DATE_TIME_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M", "%d/%m/%Y %H:%M:%S"];
const DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a notice date. Returns `None` for anything else.
pub fn parse_notice_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Oldest first.
pub fn compare_chronological(a: &Notice, b: &Notice) -> Ordering {
    a.posted_at.cmp(&b.posted_at)
}

/// Oldest first, used for delivery.
pub fn sort_ascending(notices: &mut [Notice]) {
    notices.sort_by(compare_chronological);
}

/// Newest first, used for the cache and queries.
pub fn sort_descending(notices: &mut [Notice]) {
    notices.sort_by(|a, b| compare_chronological(b, a));
}
