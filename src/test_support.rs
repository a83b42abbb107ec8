//! In-memory doubles for the source, transport and ledger store.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::RawNotice;
use crate::pipeline::Fingerprint;
use crate::services::{NoticeSource, Transport};
use crate::storage::LedgerStore;

/// Transport that records every attempt and fails on matching messages.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    attempts: Mutex<Vec<Instant>>,
    failing: Mutex<Vec<String>>,
    stall: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every message containing `needle`.
    pub fn fail_containing(&self, needle: &str) {
        self.failing.lock().unwrap().push(needle.to_string());
    }

    /// Stop failing.
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Sleep this long inside every send.
    pub fn stall_for(&self, duration: Duration) {
        *self.stall.lock().unwrap() = Some(duration);
    }

    /// Successful sends as `(message, destination)`.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Titles of successful sends, taken from the default template's first line.
    pub fn delivered_titles(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(message, _)| {
                let first_line = message.lines().next()?;
                first_line.split(" - ").nth(1).map(str::to_string)
            })
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &str, destination: &str) -> Result<()> {
        self.attempts.lock().unwrap().push(Instant::now());

        let stall = *self.stall.lock().unwrap();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }

        let fails = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| message.contains(needle.as_str()));
        if fails {
            return Err(AppError::delivery(destination, "gateway unavailable"));
        }

        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), destination.to_string()));
        Ok(())
    }
}

/// Source returning a configurable batch.
#[derive(Default)]
pub struct StaticSource {
    batch: Mutex<Vec<RawNotice>>,
    failing: Mutex<bool>,
    fetches: Mutex<usize>,
}

impl StaticSource {
    pub fn new(batch: Vec<RawNotice>) -> Self {
        Self {
            batch: Mutex::new(batch),
            ..Self::default()
        }
    }

    pub fn set_batch(&self, batch: Vec<RawNotice>) {
        *self.batch.lock().unwrap() = batch;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl NoticeSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<RawNotice>> {
        *self.fetches.lock().unwrap() += 1;
        if *self.failing.lock().unwrap() {
            return Err(AppError::fetch("static source", "connection refused"));
        }
        Ok(self.batch.lock().unwrap().clone())
    }
}

/// Ledger store kept in memory; clones of the `Arc` simulate restarts.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Vec<Fingerprint>>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn saved(&self) -> Option<Vec<Fingerprint>> {
        self.saved.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self) -> Result<Option<Vec<Fingerprint>>> {
        Ok(self.saved())
    }

    async fn save(&self, fingerprints: &[Fingerprint]) -> Result<()> {
        *self.saved.lock().unwrap() = Some(fingerprints.to_vec());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Raw record with the source's field layout.
pub fn raw_notice(subject: &str, title: &str, date: &str, body: &str) -> RawNotice {
    RawNotice {
        subject: Some(subject.to_string()),
        title: Some(title.to_string()),
        date: Some(date.to_string()),
        body: Some(body.to_string()),
        author: Some("Cátedra".to_string()),
    }
}
