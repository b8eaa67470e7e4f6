use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a session, reported at teardown and from the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub source_language: String,
    pub target_language: String,
    /// Translations emitted so far
    pub translation_count: u64,
    /// Decisions taken so far
    pub decision_checks: u64,
    pub decision_approvals: u64,
}
