//! Notice data structures.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::pipeline::ordering::parse_notice_date;

/// Title used when the source omits one.
pub const UNTITLED: &str = "Sin título";

/// Author used when the source omits one or leaves it blank.
pub const UNSPECIFIED_AUTHOR: &str = "No especificado";

/// A notice as published by the source, before normalization.
///
/// The board publishes Spanish keys (`materia`, `titulo`, ...); both those
/// and the English names are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotice {
    #[serde(default, alias = "materia")]
    pub subject: Option<String>,

    #[serde(default, alias = "titulo")]
    pub title: Option<String>,

    /// `DD/MM/YYYY[ HH:MM]`
    #[serde(default, alias = "fecha")]
    pub date: Option<String>,

    /// Entity-encoded HTML
    #[serde(default, alias = "cuerpo")]
    pub body: Option<String>,

    #[serde(default, alias = "autor")]
    pub author: Option<String>,
}

/// Envelope returned by the source endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoticeBatch {
    #[serde(default, alias = "mensajes")]
    pub notices: Vec<RawNotice>,
}

/// A normalized notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Logical grouping key (course or category)
    pub subject: String,

    pub title: String,

    /// Publication date as published, `DD/MM/YYYY[ HH:MM]`
    pub date: String,

    /// Plain text body
    pub body: String,

    pub author: String,

    #[serde(skip)]
    pub(crate) posted_at: NaiveDateTime,

    /// Title exactly as the source sent it, used for identity
    #[serde(skip)]
    pub(crate) source_title: String,
}

impl Notice {
    /// Build a notice from already clean fields.
    ///
    /// Returns `None` when `date` cannot be parsed. Title and author
    /// defaults are applied the same way the normalizer applies them.
    pub fn from_parts(
        subject: impl Into<String>,
        title: impl Into<String>,
        date: impl Into<String>,
        body: impl Into<String>,
        author: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        let date = date.into();
        let posted_at = parse_notice_date(&date)?;

        Some(Self {
            subject: subject.into(),
            title: title_or_default(&title),
            date,
            body: body.into(),
            author: author_or_default(&author.into()),
            posted_at,
            source_title: title,
        })
    }

    /// Parsed publication timestamp.
    pub fn posted_at(&self) -> NaiveDateTime {
        self.posted_at
    }

    /// Title used for identity, before any default was applied.
    pub fn source_title(&self) -> &str {
        &self.source_title
    }

    /// Format notice for delivery using a template.
    ///
    /// Supported placeholders: `{subject}`, `{title}`, `{date}`, `{author}`, `{body}`.
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{subject}", &self.subject)
            .replace("{title}", &self.title)
            .replace("{date}", &self.date)
            .replace("{author}", &self.author)
            .replace("{body}", &self.body)
    }
}

pub(crate) fn title_or_default(title: &str) -> String {
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    }
}

pub(crate) fn author_or_default(author: &str) -> String {
    let trimmed = author.trim();
    if trimmed.is_empty() {
        UNSPECIFIED_AUTHOR.to_string()
    } else {
        trimmed.to_string()
    }
}
