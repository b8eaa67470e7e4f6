//! Persistence adapters
//!
//! An append-only debug-log sink for emitted translations with lazy
//! retention cleanup, and a write-only usage counter. Both are best-effort:
//! failures never reach the pipeline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::rules::text::tail_chars;

const MAX_ROWS: usize = 500;
const RETENTION_MINUTES: i64 = 45;
const MAX_TEXT_CHARS: usize = 1_000;

/// One row per emitted translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub session_id: String,
    pub client_id: String,
    pub source_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub reason: String,
    pub app_version: String,
    pub created_at: DateTime<Utc>,
}

impl TranslationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: &str,
        client_id: &str,
        source_text: &str,
        translated_text: &str,
        source_language: &str,
        target_language: &str,
        reason: &str,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            source_text: tail_chars(source_text, MAX_TEXT_CHARS).to_string(),
            translated_text: tail_chars(translated_text, MAX_TEXT_CHARS).to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            reason: reason.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only debug-log sink.
///
/// Retention is applied lazily on each append: rows older than 45 minutes
/// are deleted, then the total is capped at 500 rows.
pub struct TranslationLog {
    rows: Mutex<VecDeque<TranslationRecord>>,
}

impl TranslationLog {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn append(&self, record: TranslationRecord) {
        let mut rows = self.rows.lock().await;
        let horizon = Utc::now() - ChronoDuration::minutes(RETENTION_MINUTES);
        while rows.front().is_some_and(|r| r.created_at < horizon) {
            rows.pop_front();
        }
        rows.push_back(record);
        while rows.len() > MAX_ROWS {
            rows.pop_front();
        }
        debug!(rows = rows.len(), "translation log appended");
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Most recent rows, newest last.
    pub async fn recent(&self, limit: usize) -> Vec<TranslationRecord> {
        let rows = self.rows.lock().await;
        rows.iter().rev().take(limit).rev().cloned().collect()
    }
}

impl Default for TranslationLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request cap on reported character counts, preventing inflation from
/// a misbehaving session.
const MAX_USAGE_PER_REQUEST: u64 = 10_000;

/// Write-only usage counter.
pub struct UsageTracker {
    translated_chars: AtomicU64,
    requests: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            translated_chars: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    pub fn record_translation(&self, chars: u64) {
        let capped = chars.min(MAX_USAGE_PER_REQUEST);
        self.translated_chars.fetch_add(capped, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn translated_chars(&self) -> u64 {
        self.translated_chars.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}
