// Domain Layer - Pure business logic and entities

pub mod cadence;
pub mod decision;
pub mod error;
pub mod field_set;
pub mod job;
pub mod progress;
pub mod record;
pub mod upload;

// Re-exports
pub use cadence::{Cadence, CadenceRules};
pub use decision::{Decision, SkipReason};
pub use error::{DomainError, ErrorKind};
pub use field_set::{Field, FieldChange, FieldSet};
pub use job::{JobId, JobState, SessionId, StoreCredentials, SyncJob};
pub use progress::{
    ErrorInfo, ItemError, ProgressEvent, ProgressSnapshot, ProgressStatus, SyncCounts,
};
pub use record::{CandidateRecord, ContactFields, ExistingRecord, RecordId};
pub use upload::UploadedFile;
