// Job Tracker - in-memory progress snapshots, one per accepted job

use crate::domain::{
    ErrorInfo, ItemError, JobId, JobState, ProgressEvent, ProgressSnapshot, ProgressStatus,
    SessionId, SyncCounts,
};
use crate::port::TimeProvider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Latest known progress of every job, for pollers and the watchdog.
///
/// A snapshot is created when a job is accepted and frozen once it reaches a
/// terminal state: later events for that job are rejected. Nothing here is
/// persisted.
pub struct JobTracker {
    snapshots: RwLock<HashMap<JobId, ProgressSnapshot>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobTracker {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            time_provider,
        }
    }

    /// Create the Queued snapshot of a newly accepted job
    pub fn register(&self, job_id: &str, session_id: &str) -> ProgressSnapshot {
        let now = self.time_provider.now_millis();
        let snapshot = ProgressSnapshot::queued(job_id.to_string(), session_id.to_string(), now);
        self.write().insert(job_id.to_string(), snapshot.clone());
        snapshot
    }

    /// Forget a job (submission rolled back)
    pub fn remove(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.write().remove(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.read().get(job_id).cloned()
    }

    pub fn state(&self, job_id: &str) -> Option<JobState> {
        self.read().get(job_id).map(|s| s.state)
    }

    pub fn is_terminal(&self, job_id: &str) -> bool {
        self.state(job_id).is_some_and(|s| s.is_terminal())
    }

    /// Fold an event into its job's snapshot.
    ///
    /// Returns false when the job is unknown or already terminal, in which
    /// case the event must not be published.
    pub fn record(&self, event: &ProgressEvent, counts: &SyncCounts) -> bool {
        let mut snapshots = self.write();
        let Some(snapshot) = snapshots.get_mut(&event.job_id) else {
            return false;
        };
        if snapshot.state.is_terminal() {
            debug!(job_id = %event.job_id, state = %snapshot.state, "Dropping event for finished job");
            return false;
        }

        snapshot.state = match event.status {
            ProgressStatus::Queued => JobState::Queued,
            ProgressStatus::Processing | ProgressStatus::Retrying => JobState::Processing,
            ProgressStatus::Completed => JobState::Completed,
            ProgressStatus::Error => JobState::Error,
        };
        snapshot.current = event.current;
        snapshot.total = event.total;
        snapshot.message = event.message.clone();
        snapshot.counts = *counts;
        if event.error.is_some() && snapshot.state.is_terminal() {
            snapshot.error = event.error.clone();
        }
        snapshot.updated_at = event.timestamp;
        true
    }

    /// Append a per-item failure to a running job
    pub fn push_item_error(&self, job_id: &str, error: ItemError) {
        if let Some(snapshot) = self.write().get_mut(job_id) {
            if !snapshot.state.is_terminal() {
                snapshot.item_errors.push(error);
            }
        }
    }

    /// Move a job to a terminal state without an event.
    ///
    /// Returns the updated snapshot, or None if the job was unknown or
    /// already terminal (first terminal state wins).
    pub fn finish(
        &self,
        job_id: &str,
        state: JobState,
        error: Option<ErrorInfo>,
    ) -> Option<ProgressSnapshot> {
        let now = self.time_provider.now_millis();
        let mut snapshots = self.write();
        let snapshot = snapshots.get_mut(job_id)?;
        if snapshot.state.is_terminal() {
            return None;
        }
        snapshot.state = state;
        snapshot.error = error;
        snapshot.updated_at = now;
        Some(snapshot.clone())
    }

    /// Running jobs whose last update is older than `idle_millis`.
    ///
    /// Queued jobs are never stalled: they wait on the worker, not on the store.
    pub fn stalled(&self, idle_millis: i64) -> Vec<ProgressSnapshot> {
        let now = self.time_provider.now_millis();
        self.read()
            .values()
            .filter(|s| s.state == JobState::Processing && now - s.updated_at > idle_millis)
            .cloned()
            .collect()
    }

    /// Drop terminal snapshots older than `retain_millis`; returns how many
    pub fn prune_finished(&self, retain_millis: i64) -> usize {
        let now = self.time_provider.now_millis();
        let mut snapshots = self.write();
        let before = snapshots.len();
        snapshots.retain(|_, s| !(s.state.is_terminal() && now - s.updated_at > retain_millis));
        before - snapshots.len()
    }

    /// Jobs of a session, oldest first
    pub fn for_session(&self, session_id: &SessionId) -> Vec<ProgressSnapshot> {
        let mut jobs: Vec<_> = self
            .read()
            .values()
            .filter(|s| &s.session_id == session_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|s| s.created_at);
        jobs
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, ProgressSnapshot>> {
        self.snapshots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, ProgressSnapshot>> {
        self.snapshots.write().unwrap_or_else(|e| e.into_inner())
    }
}
