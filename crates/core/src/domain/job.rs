// Sync Job Domain Model

use super::error::{DomainError, Result};
use super::upload::UploadedFile;
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Logical client connection a job runs on behalf of
pub type SessionId = String;

/// Job lifecycle state.
///
/// `Queued -> Processing -> Completed | Error | Abandoned`. Retrying is a
/// sub-state of a single item and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
    Abandoned,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Error | JobState::Abandoned
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Processing => write!(f, "PROCESSING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Error => write!(f, "ERROR"),
            JobState::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

/// Contact store credentials supplied with a sync request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCredentials {
    pub token: String,
    pub database_id: String,
}

impl StoreCredentials {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() || self.database_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Both store token and database ID are required".to_string(),
            ));
        }
        Ok(())
    }
}

// Never print the token
impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("token", &"<redacted>")
            .field("database_id", &self.database_id)
            .finish()
    }
}

/// Sync Job Entity
///
/// Owns the staged upload; the file is released when the job is dropped
/// unless the worker released it earlier.
#[derive(Debug)]
pub struct SyncJob {
    pub id: JobId,
    pub session_id: SessionId,
    pub credentials: StoreCredentials,
    pub upload: UploadedFile,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl SyncJob {
    /// Create a new job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `session_id` - Session that receives progress events
    /// * `credentials` - Contact store credentials
    /// * `upload` - Staged import file
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        session_id: impl Into<String>,
        credentials: StoreCredentials,
        upload: UploadedFile,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            credentials,
            upload,
            state: JobState::Queued,
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// Transition to Processing with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        self.transition(JobState::Queued, JobState::Processing)?;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Completed with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        self.transition(JobState::Processing, JobState::Completed)?;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Mark as Error with explicit timestamp (from any non-terminal state)
    pub fn fail(&mut self, now_millis: i64) -> Result<()> {
        self.finish(JobState::Error, now_millis)
    }

    /// Mark as Abandoned with explicit timestamp (from any non-terminal state)
    pub fn abandon(&mut self, now_millis: i64) -> Result<()> {
        self.finish(JobState::Abandoned, now_millis)
    }

    fn finish(&mut self, to: JobState, now_millis: i64) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    fn transition(&mut self, from: JobState, to: JobState) -> Result<()> {
        if self.state != from {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}
