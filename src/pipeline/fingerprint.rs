//! Content fingerprints used as delivery identity.
//!
//! A fingerprint is the lowercase hex MD5 of the UTF-8 bytes of
//! `subject-title-date`. The body never participates, so edits to a
//! notice's text do not cause it to be sent again.

use std::fmt;

use serde::{Deserialize, Serialize};
use md5::{Digest, Md5};

use crate::models::Notice;

/// Delivery identity of a notice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex digest, e.g. one read back from storage.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of a notice, computed from its source title.
pub fn fingerprint(notice: &Notice) -> Fingerprint {
    fingerprint_fields(&notice.subject, notice.source_title(), &notice.date)
}

/// Fingerprint of an identity triple.
pub fn fingerprint_fields(subject: &str, title: &str, date: &str) -> Fingerprint {
    let mut hasher = Md5::new();
    hasher.update(subject.as_bytes());
    hasher.update(b"-");
    hasher.update(title.as_bytes());
    hasher.update(b"-");
    hasher.update(date.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
