//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::session::SessionHub;
use crate::types::{
    CloseSessionRequest, CloseSessionResponse, EnsureSchemaResponse, ListContactsResponse,
    OpenSessionResponse, StatsResponse, StatusRequest, StoreRequest, SubmitRequest,
    SubmitResponse, UpdateContactRequest, UpdateContactResponse,
};
use contactsync_core::application::{OverdueSummary, SyncService};
use contactsync_core::domain::{JobState, ProgressSnapshot};
use contactsync_infra_csv::UploadStaging;
use jsonrpsee::types::ErrorObjectOwned;
use std::path::PathBuf;
use std::sync::Arc;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<SyncService>,
    sessions: Arc<SessionHub>,
    staging: UploadStaging,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(service: Arc<SyncService>, sessions: Arc<SessionHub>, staging: UploadStaging) -> Self {
        Self {
            service,
            sessions,
            staging,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionHub> {
        &self.sessions
    }

    /// session.open.v1
    pub fn open_session(&self) -> OpenSessionResponse {
        OpenSessionResponse {
            session_id: self.sessions.open(),
        }
    }

    /// session.close.v1
    pub fn close_session(&self, params: CloseSessionRequest) -> CloseSessionResponse {
        let closed = self.sessions.close(&params.session_id);
        CloseSessionResponse {
            session_id: params.session_id,
            closed,
        }
    }

    /// sync.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let path = PathBuf::from(shellexpand::tilde(&params.file_path).into_owned());
        let upload = self.staging.stage(&path).await.map_err(to_rpc_error)?;

        let job_id = self
            .service
            .submit_sync(&params.session_id, params.credentials.into(), upload)
            .await
            .map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            job_id,
            state: JobState::Queued.to_string(),
            queue_depth: self.service.queue_depth(),
            queue_capacity: self.service.queue_capacity(),
        })
    }

    /// sync.status.v1
    pub fn status(&self, params: StatusRequest) -> Result<ProgressSnapshot, ErrorObjectOwned> {
        self.service.job_status(&params.job_id).map_err(to_rpc_error)
    }

    /// overdue.evaluate.v1
    pub async fn evaluate_overdue(
        &self,
        params: StoreRequest,
    ) -> Result<OverdueSummary, ErrorObjectOwned> {
        self.service
            .evaluate_overdue(&params.credentials.into())
            .await
            .map_err(to_rpc_error)
    }

    /// store.schema.ensure.v1
    pub async fn ensure_schema(
        &self,
        params: StoreRequest,
    ) -> Result<EnsureSchemaResponse, ErrorObjectOwned> {
        let added = self
            .service
            .ensure_schema(&params.credentials.into())
            .await
            .map_err(to_rpc_error)?;
        Ok(EnsureSchemaResponse { added })
    }

    /// contacts.list.v1
    pub async fn list_contacts(
        &self,
        params: StoreRequest,
    ) -> Result<ListContactsResponse, ErrorObjectOwned> {
        let contacts = self
            .service
            .list_contacts(&params.credentials.into())
            .await
            .map_err(to_rpc_error)?;
        Ok(ListContactsResponse {
            total: contacts.len(),
            contacts,
        })
    }

    /// contacts.update.v1
    pub async fn update_contact(
        &self,
        params: UpdateContactRequest,
    ) -> Result<UpdateContactResponse, ErrorObjectOwned> {
        self.service
            .update_contact(&params.credentials.into(), &params.record_id, &params.changes)
            .await
            .map_err(to_rpc_error)?;
        Ok(UpdateContactResponse {
            record_id: params.record_id.trim().to_string(),
            updated: params.changes.len(),
        })
    }

    /// admin.stats.v1
    pub fn stats(&self) -> StatsResponse {
        StatsResponse {
            queue_depth: self.service.queue_depth(),
            queue_capacity: self.service.queue_capacity(),
            active_sessions: self.sessions.active_sessions(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}
