// Domain Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Stable error kind carried by every failure surfaced to a session.
///
/// The serialized form is part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "UPSTREAM_ERROR")]
    Upstream,
    #[serde(rename = "FILE_PROCESSING_ERROR")]
    FileProcessing,
    #[serde(rename = "QUEUE_FULL_ERROR")]
    QueueFull,
    #[serde(rename = "TIMEOUT_ERROR")]
    Timeout,
    #[serde(rename = "ABANDONED")]
    Abandoned,
    #[serde(rename = "RETRY_FAILED")]
    RetryFailed,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Upstream => "UPSTREAM_ERROR",
            ErrorKind::FileProcessing => "FILE_PROCESSING_ERROR",
            ErrorKind::QueueFull => "QUEUE_FULL_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::Abandoned => "ABANDONED",
            ErrorKind::RetryFailed => "RETRY_FAILED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
