// Per-job context passed through the worker

use crate::application::tracker::JobTracker;
use crate::domain::{
    ErrorInfo, ErrorKind, ItemError, JobId, JobState, ProgressEvent, ProgressStatus, SessionId, SyncCounts,
};
use crate::port::{ProgressBroadcaster, SessionRegistry, TimeProvider};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a job stopped consuming decisions early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The owning session is no longer registered
    SessionClosed,
    /// Someone else (the watchdog) already finalized the job
    Finalized(JobState),
}

/// Everything the worker needs to report on one job.
///
/// Counters live here rather than in shared state; every emitted event is
/// folded into the tracker before it is published.
pub struct JobContext {
    pub job_id: JobId,
    pub session_id: SessionId,
    pub current: usize,
    pub total: usize,
    pub counts: SyncCounts,
    broadcaster: Arc<dyn ProgressBroadcaster>,
    sessions: Arc<dyn SessionRegistry>,
    tracker: Arc<JobTracker>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobContext {
    pub fn new(
        job_id: impl Into<JobId>,
        session_id: impl Into<SessionId>,
        broadcaster: Arc<dyn ProgressBroadcaster>,
        sessions: Arc<dyn SessionRegistry>,
        tracker: Arc<JobTracker>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            session_id: session_id.into(),
            current: 0,
            total: 0,
            counts: SyncCounts::default(),
            broadcaster,
            sessions,
            tracker,
            time_provider,
        }
    }

    /// Checked once per decision boundary
    pub fn interruption(&self) -> Option<Interruption> {
        if let Some(state) = self.tracker.state(&self.job_id) {
            if state.is_terminal() {
                return Some(Interruption::Finalized(state));
            }
        }
        if !self.sessions.is_active(&self.session_id) {
            return Some(Interruption::SessionClosed);
        }
        None
    }

    pub fn now_millis(&self) -> i64 {
        self.time_provider.now_millis()
    }

    pub async fn queued(&self, position: usize) {
        let message = format!("Queued for sync (position {})", position);
        self.emit(ProgressStatus::Queued, message, None, None).await;
    }

    pub async fn processing(&self, message: impl Into<String>, record: Option<&str>) {
        self.emit(ProgressStatus::Processing, message.into(), record, None)
            .await;
    }

    pub async fn retrying(&self, record: &str, attempt: u32, max_attempts: u32, detail: String) {
        let message = format!("Retry {}/{} for contact {}", attempt, max_attempts, record);
        let error = ErrorInfo::new(ErrorKind::Upstream, detail);
        self.emit(ProgressStatus::Retrying, message, Some(record), Some(error))
            .await;
    }

    /// Report an item whose retries ran out, and keep it on the snapshot
    pub async fn item_failed(&self, record: &str, error: ItemError) {
        let message = format!("Failed to sync contact {}: {}", record, error.detail);
        let info = ErrorInfo::new(error.kind, error.detail.clone());
        self.tracker.push_item_error(&self.job_id, error);
        self.emit(ProgressStatus::Processing, message, Some(record), Some(info))
            .await;
    }

    pub async fn completed(&self) {
        let message = format!("Sync completed: {}", self.counts);
        self.emit(ProgressStatus::Completed, message, None, None)
            .await;
    }

    pub async fn failed(&self, error: ErrorInfo) {
        let message = error.detail.clone();
        self.emit(ProgressStatus::Error, message, None, Some(error))
            .await;
    }

    /// Record and publish one event. Publish failures are only logged.
    async fn emit(
        &self,
        status: ProgressStatus,
        message: String,
        record: Option<&str>,
        error: Option<ErrorInfo>,
    ) {
        let event = ProgressEvent {
            session_id: self.session_id.clone(),
            job_id: self.job_id.clone(),
            status,
            current: self.current,
            total: self.total,
            message,
            record: record.map(str::to_string),
            error,
            timestamp: self.now_millis(),
        };

        if !self.tracker.record(&event, &self.counts) {
            debug!(job_id = %self.job_id, "Job already finalized, event not published");
            return;
        }
        if let Err(e) = self.broadcaster.publish(&self.session_id, event).await {
            warn!(
                job_id = %self.job_id,
                session_id = %self.session_id,
                error = %e,
                "Failed to publish progress event"
            );
        }
    }
}
