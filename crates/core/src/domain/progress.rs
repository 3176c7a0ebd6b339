// Progress events pushed to sessions and snapshots served to pollers

use super::error::ErrorKind;
use super::job::{JobId, JobState, SessionId};
use serde::{Deserialize, Serialize};

/// Status carried by a single progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Queued,
    Processing,
    Retrying,
    Completed,
    Error,
}

/// Stable kind plus human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub session_id: SessionId,
    pub job_id: JobId,
    pub status: ProgressStatus,
    pub current: usize,
    pub total: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timestamp: i64, // epoch ms
}

/// Per-item failure recorded after retries were exhausted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// 1-based position in the import
    pub index: usize,
    pub record: String,
    pub kind: ErrorKind,
    pub detail: String,
    pub attempts: u32,
}

/// Outcome counters for one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for SyncCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} skipped, {} failed",
            self.added, self.updated, self.skipped, self.failed
        )
    }
}

/// In-memory view of a job for polling clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: JobId,
    pub session_id: SessionId,
    pub state: JobState,
    pub current: usize,
    pub total: usize,
    pub message: String,
    pub counts: SyncCounts,
    pub item_errors: Vec<ItemError>,
    pub error: Option<ErrorInfo>,
    pub created_at: i64,
    /// Time of last progress update, watched for stalls
    pub updated_at: i64,
}

impl ProgressSnapshot {
    pub fn queued(job_id: JobId, session_id: SessionId, now_millis: i64) -> Self {
        Self {
            job_id,
            session_id,
            state: JobState::Queued,
            current: 0,
            total: 0,
            message: "Queued for sync".to_string(),
            counts: SyncCounts::default(),
            item_errors: Vec::new(),
            error: None,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }
}
