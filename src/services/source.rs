// src/services/source.rs

//! Notice list source.
//!
//! The board serves a JSON document `{"mensajes": [...]}`. When the page is
//! captured through a browser the same document arrives wrapped in
//! `<body><pre>…</pre></body>`; both shapes are accepted.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{NoticeBatch, RawNotice, SourceConfig};
use crate::utils::http::create_async_client;

/// Supplies the current list of raw notices.
#[async_trait]
pub trait NoticeSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawNotice>>;
}

/// Fetches the notice list over HTTP.
pub struct HttpNoticeSource {
    client: Client,
    url: String,
}

impl HttpNoticeSource {
    /// Create a source with a client built from the configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = create_async_client(&config.user_agent, config.timeout())?;
        Ok(Self::with_client(client, &config.url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl NoticeSource for HttpNoticeSource {
    async fn fetch(&self) -> Result<Vec<RawNotice>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::fetch(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(&self.url, format!("HTTP {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::fetch(&self.url, e))?;

        let notices = parse_payload(&text).map_err(|e| AppError::fetch(&self.url, e))?;
        log::debug!("Fetched {} raw notices from {}", notices.len(), self.url);
        Ok(notices)
    }
}

/// Extract raw notices from a JSON document or an HTML page embedding one.
pub fn parse_payload(text: &str) -> Result<Vec<RawNotice>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        let batch: NoticeBatch = serde_json::from_str(trimmed)?;
        return Ok(batch.notices);
    }

    let document = Html::parse_document(text);
    let selector = parse_selector("body > pre")?;
    let pre = document
        .select(&selector)
        .next()
        .ok_or_else(|| AppError::validation("page has no <pre> element with notice data"))?;

    let json: String = pre.text().collect();
    let batch: NoticeBatch = serde_json::from_str(&json)?;
    Ok(batch.notices)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::validation(format!("invalid selector '{s}': {e:?}")))
}
