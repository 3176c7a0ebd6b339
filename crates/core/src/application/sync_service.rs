// Sync Service - entry points exposed to the transport layer

use crate::application::overdue::{OverdueEvaluator, OverdueSummary};
use crate::application::reconcile::ReconcileOptions;
use crate::application::retry::RetryPolicy;
use crate::application::watchdog::Watchdog;
use crate::application::worker::constants::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SESSION_TTL, DEFAULT_SYNC_TIMEOUT, DEFAULT_WATCHDOG_INTERVAL,
    FINISHED_SNAPSHOT_RETENTION,
};
use crate::application::worker::{JobQueue, PipelineDeps, SyncWorker};
use crate::domain::{
    CadenceRules, ExistingRecord, FieldSet, JobId, ProgressSnapshot, RecordId, StoreCredentials,
    SyncJob, UploadedFile,
};
use crate::error::{Result, SyncError};
use crate::port::{IdProvider, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Tunables of the sync pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Jobs accepted at once, queued plus in-flight
    pub queue_capacity: usize,
    pub retry_policy: RetryPolicy,
    pub reconcile: ReconcileOptions,
    pub cadence_rules: CadenceRules,
    /// Max time without a progress update before the watchdog fails a job
    pub sync_timeout: Duration,
    /// Max time without client activity before the watchdog closes a session
    pub session_ttl: Duration,
    pub watchdog_interval: Duration,
    pub snapshot_retention: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry_policy: RetryPolicy::default(),
            reconcile: ReconcileOptions::default(),
            cadence_rules: CadenceRules::default(),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            snapshot_retention: FINISHED_SNAPSHOT_RETENTION,
        }
    }
}

/// Service plus the two background tasks the caller must spawn
pub struct Pipeline {
    pub service: Arc<SyncService>,
    pub worker: SyncWorker,
    pub watchdog: Watchdog,
}

pub struct SyncService {
    queue: JobQueue,
    deps: PipelineDeps,
    id_provider: Arc<dyn IdProvider>,
    overdue: OverdueEvaluator,
    retry_policy: RetryPolicy,
}

impl SyncService {
    /// Wire the queue, worker and watchdog around shared collaborators
    pub fn build(
        deps: PipelineDeps,
        id_provider: Arc<dyn IdProvider>,
        config: PipelineConfig,
    ) -> Pipeline {
        let (queue, receiver) = JobQueue::bounded(config.queue_capacity);
        let worker = SyncWorker::new(
            receiver,
            deps.clone(),
            config.retry_policy.clone(),
            config.reconcile,
        );
        let watchdog = Watchdog::new(
            Arc::clone(&deps.tracker),
            Arc::clone(&deps.broadcaster),
            Arc::clone(&deps.sessions),
            config.sync_timeout,
            config.session_ttl,
            config.watchdog_interval,
            config.snapshot_retention,
        );
        let service = Arc::new(Self {
            queue,
            overdue: OverdueEvaluator::new(config.cadence_rules, config.retry_policy.clone()),
            retry_policy: config.retry_policy,
            deps,
            id_provider,
        });

        Pipeline {
            service,
            worker,
            watchdog,
        }
    }

    /// Accept a sync request without blocking.
    ///
    /// Fails with a validation error for bad input or an unknown session and
    /// with QueueFull when capacity is exhausted. A rejected upload is
    /// released on the way out.
    pub async fn submit_sync(
        &self,
        session_id: &str,
        credentials: StoreCredentials,
        upload: UploadedFile,
    ) -> Result<JobId> {
        if session_id.trim().is_empty() {
            return Err(SyncError::Validation("Session ID is required".to_string()));
        }
        credentials.validate()?;
        if !self.deps.sessions.touch(session_id) {
            return Err(SyncError::Validation(format!(
                "Session {} is not open",
                session_id
            )));
        }

        let slot = self.queue.reserve()?;
        let position = slot.position;

        let job_id = self.id_provider.generate_id();
        let now = self.deps.time_provider.now_millis();
        let job = SyncJob::new(job_id.clone(), now, session_id, credentials, upload);

        self.deps.tracker.register(&job_id, session_id);
        self.deps.job_context(&job).queued(position).await;

        if let Err(e) = slot.send(job) {
            self.deps.tracker.remove(&job_id);
            return Err(e);
        }

        info!(
            job_id = %job_id,
            session_id = %session_id,
            position = position,
            "Sync job queued"
        );
        Ok(job_id)
    }

    /// Latest progress snapshot of a job.
    ///
    /// Polling counts as activity of the job's session.
    pub fn job_status(&self, job_id: &str) -> Result<ProgressSnapshot> {
        let snapshot = self
            .deps
            .tracker
            .get(job_id)
            .ok_or_else(|| SyncError::NotFound(format!("job {}", job_id)))?;
        self.deps.sessions.touch(&snapshot.session_id);
        Ok(snapshot)
    }

    /// Recompute the overdue flag of every stored record
    pub async fn evaluate_overdue(&self, credentials: &StoreCredentials) -> Result<OverdueSummary> {
        let store = self.deps.connect(credentials)?;
        let today = self.deps.time_provider.today();
        self.overdue.run(store.as_ref(), today).await
    }

    /// Add any contact property the database is missing.
    ///
    /// Returns the names of the properties added; empty when the schema was
    /// already complete.
    pub async fn ensure_schema(&self, credentials: &StoreCredentials) -> Result<Vec<String>> {
        let store = self.deps.connect(credentials)?;
        let added = self
            .retry_policy
            .attempt(|| store.ensure_schema(), |_, _: &StoreError| async {})
            .await
            .map_err(|failure| SyncError::Upstream(failure.error))?;
        info!(added = added.len(), "Contact database schema checked");
        Ok(added)
    }

    /// Every stored contact, in store order
    pub async fn list_contacts(&self, credentials: &StoreCredentials) -> Result<Vec<ExistingRecord>> {
        let store = self.deps.connect(credentials)?;
        self.retry_policy
            .attempt(|| store.fetch_all(), |_, _: &StoreError| async {})
            .await
            .map_err(|failure| SyncError::Upstream(failure.error))
    }

    /// Write the given fields of one stored contact; other fields are untouched
    pub async fn update_contact(
        &self,
        credentials: &StoreCredentials,
        record_id: &str,
        changes: &FieldSet,
    ) -> Result<()> {
        let id: RecordId = record_id.trim().to_string();
        if id.is_empty() {
            return Err(SyncError::Validation("Record ID is required".to_string()));
        }
        if changes.is_empty() {
            return Err(SyncError::Validation("No fields to update".to_string()));
        }

        let store = self.deps.connect(credentials)?;
        self.retry_policy
            .attempt(|| store.update(&id, changes), |_, _: &StoreError| async {})
            .await
            .map_err(|failure| SyncError::Upstream(failure.error))?;
        info!(record_id = %id, fields = changes.len(), "Contact updated");
        Ok(())
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Jobs queued or running right now
    pub fn queue_depth(&self) -> usize {
        self.queue.occupied()
    }
}
