// Candidate Source Port (Interface)

use crate::domain::CandidateRecord;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Import parsing errors (whole-job faults)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Cannot read import file: {0}")]
    Io(String),

    #[error("Malformed import at line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

/// Produces candidate records from an import file, in file order.
///
/// An empty result is valid and yields zero decisions.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<Vec<CandidateRecord>, SourceError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Returns a fixed candidate list (or error) regardless of the path
    pub struct MockCandidateSource {
        result: Result<Vec<CandidateRecord>, SourceError>,
    }

    impl MockCandidateSource {
        pub fn new(candidates: Vec<CandidateRecord>) -> Self {
            Self {
                result: Ok(candidates),
            }
        }

        pub fn failing(err: SourceError) -> Self {
            Self { result: Err(err) }
        }
    }

    #[async_trait]
    impl CandidateSource for MockCandidateSource {
        async fn parse(&self, _path: &Path) -> Result<Vec<CandidateRecord>, SourceError> {
            self.result.clone()
        }
    }
}
