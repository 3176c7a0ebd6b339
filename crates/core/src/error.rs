// Central Error Type for the Application

use crate::domain::{DomainError, ErrorInfo, ErrorKind, SessionId};
use crate::port::{SourceError, StoreError};
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Sync queue is full (capacity {capacity}), try again later")]
    QueueFull { capacity: usize },

    #[error("Upstream error: {0}")]
    Upstream(#[from] StoreError),

    #[error("File processing error: {0}")]
    FileProcessing(#[from] SourceError),

    #[error("No progress for {idle_secs}s, job timed out")]
    Timeout { idle_secs: u64 },

    #[error("Session {0} is no longer active")]
    Abandoned(SessionId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Stable kind reported to sessions and RPC clients
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Domain(DomainError::ValidationError(_)) => ErrorKind::Validation,
            SyncError::Domain(_) => ErrorKind::Internal,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::QueueFull { .. } => ErrorKind::QueueFull,
            SyncError::Upstream(_) => ErrorKind::Upstream,
            SyncError::FileProcessing(_) => ErrorKind::FileProcessing,
            SyncError::Timeout { .. } => ErrorKind::Timeout,
            SyncError::Abandoned(_) => ErrorKind::Abandoned,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Io(_) | SyncError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.kind(), self.to_string())
    }
}

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
