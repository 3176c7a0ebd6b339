//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use contactsync_core::domain::{ExistingRecord, FieldSet, RecordId, SessionId, StoreCredentials};
use serde::{Deserialize, Serialize};

/// Notion credentials carried by every request that touches the store
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialParams {
    pub token: String,
    pub database_id: String,
}

impl From<CredentialParams> for StoreCredentials {
    fn from(params: CredentialParams) -> Self {
        StoreCredentials::new(params.token, params.database_id)
    }
}

/// session.open.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: SessionId,
}

/// session.close.v1
#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub session_id: SessionId,
    /// False when the session was already closed
    pub closed: bool,
}

/// sync.submit.v1 - Stage an export and queue a sync
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub session_id: SessionId,
    /// Path readable by the daemon; `~` is expanded
    pub file_path: String,
    #[serde(flatten)]
    pub credentials: CredentialParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub state: String,
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

/// sync.status.v1
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub job_id: String,
}

/// Methods that only need credentials: overdue.evaluate.v1,
/// store.schema.ensure.v1 and contacts.list.v1
#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    #[serde(flatten)]
    pub credentials: CredentialParams,
}

/// store.schema.ensure.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsureSchemaResponse {
    /// Properties created by this call; empty when nothing was missing
    pub added: Vec<String>,
}

/// contacts.list.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListContactsResponse {
    pub total: usize,
    pub contacts: Vec<ExistingRecord>,
}

/// contacts.update.v1 - Write selected fields of one contact
#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    #[serde(flatten)]
    pub credentials: CredentialParams,
    pub record_id: RecordId,
    /// `[{"field": "Company", "value": "Globex"}, ...]`
    pub changes: FieldSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateContactResponse {
    pub record_id: RecordId,
    /// Number of fields written
    pub updated: usize,
}

/// sync.progress.subscribe.v1
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub session_id: SessionId,
}

/// admin.stats.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub active_sessions: usize,
    pub uptime_seconds: u64,
}
