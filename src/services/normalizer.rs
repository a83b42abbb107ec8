// src/services/normalizer.rs

//! Notice normalization.
//!
//! Turns the entity-encoded HTML published by the board into plain text and
//! raw records into [`Notice`] values sorted newest first.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::models::{Notice, RawNotice, author_or_default, title_or_default};
use crate::pipeline::ordering::{parse_notice_date, sort_descending};

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href="([^"]+)"[^>]*>(.*?)</a>"#).expect("valid anchor pattern")
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:h[1-6]|p|div|br|li|ul|ol)[^>]*>").expect("valid block tag pattern")
});

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:strong|em|span|u)[^>]*>").expect("valid inline tag pattern")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid blank line pattern"));

/// Normalize a raw batch, dropping records without a usable date.
///
/// The result is ordered newest first.
pub fn normalize_batch(raw: Vec<RawNotice>) -> Vec<Notice> {
    let total = raw.len();
    let mut notices: Vec<Notice> = raw.into_iter().filter_map(normalize_notice).collect();

    let dropped = total - notices.len();
    if dropped > 0 {
        log::debug!("Dropped {} of {} notices without a valid date", dropped, total);
    }

    sort_descending(&mut notices);
    notices
}

/// Normalize a single record. Returns `None` when the date is missing or unparseable.
pub fn normalize_notice(raw: RawNotice) -> Option<Notice> {
    let date = raw.date.as_deref().map(str::trim).unwrap_or("");
    if date.is_empty() {
        return None;
    }

    let Some(posted_at) = parse_notice_date(date) else {
        log::warn!(
            "Skipping notice {:?}: unparseable date {:?}",
            raw.title.as_deref().unwrap_or(""),
            date
        );
        return None;
    };

    let source_title = raw.title.unwrap_or_default();

    Some(Notice {
        subject: raw.subject.unwrap_or_default(),
        title: title_or_default(&source_title),
        date: date.to_string(),
        body: normalize_body(raw.body.as_deref().unwrap_or("")),
        author: author_or_default(raw.author.as_deref().unwrap_or("")),
        posted_at,
        source_title,
    })
}

/// Convert an entity-encoded HTML body into plain text.
///
/// Links survive as `text (url)`; block tags become line breaks; blank
/// lines and surrounding whitespace are removed.
pub fn normalize_body(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let decoded = decode_entities(&unified);
    let linked = ANCHOR.replace_all(&decoded, "${2} (${1})");
    let broken = BLOCK_TAG.replace_all(&linked, "\n");
    let unstyled = INLINE_TAG.replace_all(&broken, "");
    let stripped = ANY_TAG.replace_all(&unstyled, "");
    let collapsed = BLANK_RUN.replace_all(&stripped, "\n\n");

    collapsed
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode character references while leaving markup untouched.
///
/// Every `<` is escaped before parsing so the HTML tokenizer sees a single
/// text node; reading it back yields the decoded text with tags intact.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let protected = raw.replace('<', "&lt;");
    let fragment = Html::parse_fragment(&protected);
    fragment.root_element().text().collect()
}
