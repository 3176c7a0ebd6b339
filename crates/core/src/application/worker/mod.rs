// Worker - serial sync job execution

pub mod constants;
mod context;
mod queue;
mod shutdown;

pub use context::{Interruption, JobContext};
pub use queue::{JobQueue, JobReceiver, QueueSlot, QueuedJob};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::reconcile::{reconcile_with, ReconcileOptions};
use crate::application::retry::{AttemptFailure, RetryPolicy};
use crate::application::tracker::JobTracker;
use crate::domain::{
    CandidateRecord, Decision, DomainError, ErrorKind, ItemError, JobState, StoreCredentials, SyncJob,
};
use crate::error::{Result, SyncError};
use crate::port::{
    CandidateSource, ContactStore, ContactStoreFactory, ProgressBroadcaster, SessionRegistry,
    SourceError, StoreError, TimeProvider,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators shared by the submit path, the worker and the watchdog
#[derive(Clone)]
pub struct PipelineDeps {
    pub store_factory: Arc<dyn ContactStoreFactory>,
    pub source: Arc<dyn CandidateSource>,
    pub broadcaster: Arc<dyn ProgressBroadcaster>,
    pub sessions: Arc<dyn SessionRegistry>,
    pub tracker: Arc<JobTracker>,
    pub time_provider: Arc<dyn TimeProvider>,
}

impl PipelineDeps {
    /// Store client for one request; bad credentials are a validation error
    pub fn connect(&self, credentials: &StoreCredentials) -> Result<Arc<dyn ContactStore>> {
        credentials.validate()?;
        self.store_factory
            .connect(credentials)
            .map_err(|e| match e {
                StoreError::InvalidCredentials(msg) => SyncError::Validation(msg),
                other => SyncError::Upstream(other),
            })
    }

    /// Fresh reporting context for a job
    pub fn job_context(&self, job: &SyncJob) -> JobContext {
        JobContext::new(
            job.id.clone(),
            job.session_id.clone(),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.sessions),
            Arc::clone(&self.tracker),
            Arc::clone(&self.time_provider),
        )
    }
}

/// Why `sync` returned before reaching the end of the list
enum Stop {
    Interrupted(Interruption),
    Failed(SyncError),
}

impl From<SyncError> for Stop {
    fn from(err: SyncError) -> Self {
        Stop::Failed(err)
    }
}

impl From<DomainError> for Stop {
    fn from(err: DomainError) -> Self {
        Stop::Failed(err.into())
    }
}

impl From<SourceError> for Stop {
    fn from(err: SourceError) -> Self {
        Stop::Failed(err.into())
    }
}

/// Store mutation that went through
enum Applied {
    Added,
    Updated,
}

/// Executes one job at a time, in submission order
pub struct SyncWorker {
    receiver: JobReceiver,
    runner: Arc<JobRunner>,
}

struct JobRunner {
    deps: PipelineDeps,
    retry_policy: RetryPolicy,
    reconcile: ReconcileOptions,
}

impl SyncWorker {
    pub fn new(
        receiver: JobReceiver,
        deps: PipelineDeps,
        retry_policy: RetryPolicy,
        reconcile: ReconcileOptions,
    ) -> Self {
        Self {
            receiver,
            runner: Arc::new(JobRunner {
                deps,
                retry_policy,
                reconcile,
            }),
        }
    }

    /// Run worker loop with graceful shutdown support.
    ///
    /// A job already in progress runs to its end before the loop exits.
    pub async fn run(mut self, mut shutdown: ShutdownToken) {
        info!("Sync worker started");
        loop {
            if shutdown.is_shutdown() {
                info!("Sync worker shutting down");
                break;
            }
            tokio::select! {
                next = self.receiver.recv() => match next {
                    Some(queued) => self.process(queued).await,
                    None => {
                        info!("Job queue closed");
                        break;
                    }
                },
                _ = shutdown.wait() => {
                    info!("Sync worker interrupted while idle");
                    break;
                }
            }
        }
        info!("Sync worker stopped");
    }

    /// Process the next queued job if there is one (returns true if a job ran)
    pub async fn process_next(&mut self) -> bool {
        match self.receiver.try_recv() {
            Ok(queued) => {
                self.process(queued).await;
                true
            }
            Err(_) => false,
        }
    }

    /// Run a job on its own task so a panic cannot take the worker down
    async fn process(&self, queued: QueuedJob) {
        let job_id = queued.job.id.clone();
        let runner = Arc::clone(&self.runner);
        let handle = tokio::spawn(async move { runner.execute(queued).await });

        if let Err(join_err) = handle.await {
            error!(job_id = %job_id, error = %join_err, "Sync job panicked");
            let info = SyncError::Internal("sync job panicked".to_string()).to_info();
            self.runner
                .deps
                .tracker
                .finish(&job_id, JobState::Error, Some(info));
        }
    }
}

impl JobRunner {
    async fn execute(&self, mut queued: QueuedJob) {
        let job = &mut queued.job;
        let mut ctx = self.deps.job_context(job);

        let result = match ctx.interruption() {
            Some(stop) => Err(Stop::Interrupted(stop)),
            None => self.sync(job, &mut ctx).await,
        };
        self.finalize(job, &ctx, result).await;

        if job.upload.release() {
            debug!(job_id = %job.id, "Upload released");
        }
        // Dropping `queued` frees the capacity slot
    }

    async fn sync(&self, job: &mut SyncJob, ctx: &mut JobContext) -> std::result::Result<(), Stop> {
        job.start(ctx.now_millis())?;
        info!(job_id = %job.id, session_id = %job.session_id, "Processing sync job");
        ctx.processing("Starting sync process...", None).await;

        let store = self.deps.connect(&job.credentials)?;

        ctx.processing("Parsing export file...", None).await;
        let candidates = self.deps.source.parse(job.upload.path()).await?;

        let existing = self
            .retry_policy
            .attempt(|| store.fetch_all(), |_, _: &StoreError| async {})
            .await
            .map_err(|failure| SyncError::Upstream(failure.error))?;

        let decisions = reconcile_with(&existing, &candidates, &self.reconcile);
        ctx.total = candidates.len();
        ctx.processing(format!("Found {} contacts to process", ctx.total), None)
            .await;

        for (index, (candidate, decision)) in candidates.iter().zip(decisions).enumerate() {
            if let Some(stop) = ctx.interruption() {
                return Err(Stop::Interrupted(stop));
            }
            ctx.current = index + 1;
            self.apply(store.as_ref(), candidate, decision, ctx).await;
        }

        // Every item is applied; a session closing now does not undo the work
        match ctx.interruption() {
            Some(stop @ Interruption::Finalized(_)) => Err(Stop::Interrupted(stop)),
            _ => Ok(()),
        }
    }

    /// Apply one decision and emit exactly one outcome event for it
    async fn apply(
        &self,
        store: &dyn ContactStore,
        candidate: &CandidateRecord,
        decision: Decision,
        ctx: &mut JobContext,
    ) {
        let label = candidate.label();
        let (i, n) = (ctx.current, ctx.total);

        let outcome = match decision {
            Decision::Skip { reason } => {
                ctx.counts.skipped += 1;
                let message = format!("Skipping contact: {} ({}) ({}/{})", label, reason, i, n);
                ctx.processing(message, Some(label)).await;
                return;
            }
            Decision::Add(record) => self
                .attempt(ctx, label, || store.create(&record))
                .await
                .map(|id| {
                    debug!(record_id = %id, "Contact created");
                    Applied::Added
                }),
            Decision::Update { id, changes } => {
                debug!(record_id = %id, fields = changes.len(), "Updating contact");
                self.attempt(ctx, label, || store.update(&id, &changes))
                    .await
                    .map(|()| Applied::Updated)
            }
        };

        match outcome {
            Ok(Applied::Added) => {
                ctx.counts.added += 1;
                let message = format!("Adding contact: {} ({}/{})", label, i, n);
                ctx.processing(message, Some(label)).await;
            }
            Ok(Applied::Updated) => {
                ctx.counts.updated += 1;
                let message = format!("Updating contact: {} ({}/{})", label, i, n);
                ctx.processing(message, Some(label)).await;
            }
            Err(failure) => {
                ctx.counts.failed += 1;
                let kind = if failure.error.is_retryable() {
                    ErrorKind::RetryFailed
                } else {
                    ErrorKind::Upstream
                };
                warn!(
                    job_id = %ctx.job_id,
                    record = %label,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Giving up on contact"
                );
                let item = ItemError {
                    index: i,
                    record: label.to_string(),
                    kind,
                    detail: failure.error.to_string(),
                    attempts: failure.attempts,
                };
                ctx.item_failed(label, item).await;
            }
        }
    }

    /// Store call under the retry policy, reporting each retry to the session
    async fn attempt<T, Op, Fut>(
        &self,
        ctx: &JobContext,
        label: &str,
        op: Op,
    ) -> std::result::Result<T, AttemptFailure<StoreError>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let max_attempts = self.retry_policy.max_attempts;
        self.retry_policy
            .attempt(op, move |attempt, err: &StoreError| {
                let detail = err.to_string();
                async move { ctx.retrying(label, attempt, max_attempts, detail).await }
            })
            .await
    }

    async fn finalize(
        &self,
        job: &mut SyncJob,
        ctx: &JobContext,
        result: std::result::Result<(), Stop>,
    ) {
        let now = ctx.now_millis();
        let transition = match result {
            Ok(()) => {
                let transition = job.complete(now);
                ctx.completed().await;
                info!(job_id = %job.id, counts = %ctx.counts, "Sync completed");
                transition
            }
            Err(Stop::Interrupted(Interruption::SessionClosed)) => {
                let info = SyncError::Abandoned(job.session_id.clone()).to_info();
                self.deps
                    .tracker
                    .finish(&job.id, JobState::Abandoned, Some(info));
                info!(
                    job_id = %job.id,
                    session_id = %job.session_id,
                    processed = ctx.current,
                    total = ctx.total,
                    "Session closed, job abandoned"
                );
                job.abandon(now)
            }
            Err(Stop::Interrupted(Interruption::Finalized(state))) => {
                info!(job_id = %job.id, state = %state, "Job finalized elsewhere, stopping");
                match state {
                    JobState::Abandoned => job.abandon(now),
                    _ => job.fail(now),
                }
            }
            Err(Stop::Failed(err)) => {
                error!(job_id = %job.id, kind = %err.kind(), error = %err, "Sync job failed");
                ctx.failed(err.to_info()).await;
                job.fail(now)
            }
        };

        if let Err(e) = transition {
            warn!(job_id = %job.id, error = %e, "Unexpected job state transition");
        }
    }
}
