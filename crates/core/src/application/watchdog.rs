// Watchdog - fails jobs that stopped reporting progress, closes idle sessions

use crate::application::tracker::JobTracker;
use crate::application::worker::ShutdownToken;
use crate::domain::{JobState, ProgressEvent, ProgressStatus};
use crate::error::SyncError;
use crate::port::{ProgressBroadcaster, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodic scan of the job tracker.
///
/// A running job whose last update is older than `sync_timeout` is marked
/// `Error(TIMEOUT_ERROR)` and a terminal event is published. The worker
/// notices the terminal state at its next decision boundary. Queued jobs are
/// left alone however long they wait.
///
/// Sessions without client activity for `session_ttl` are closed, which
/// abandons their jobs the same way an explicit close does.
pub struct Watchdog {
    tracker: Arc<JobTracker>,
    broadcaster: Arc<dyn ProgressBroadcaster>,
    sessions: Arc<dyn SessionRegistry>,
    sync_timeout: Duration,
    session_ttl: Duration,
    interval: Duration,
    retention: Duration,
}

impl Watchdog {
    /// Create a new watchdog
    ///
    /// # Arguments
    /// * `sync_timeout` - Max time a running job may go without a progress update
    /// * `session_ttl` - Max time a session may go without client activity
    /// * `interval` - How often to scan
    /// * `retention` - How long finished snapshots stay pollable
    pub fn new(
        tracker: Arc<JobTracker>,
        broadcaster: Arc<dyn ProgressBroadcaster>,
        sessions: Arc<dyn SessionRegistry>,
        sync_timeout: Duration,
        session_ttl: Duration,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            tracker,
            broadcaster,
            sessions,
            sync_timeout,
            session_ttl,
            interval,
            retention,
        }
    }

    /// Run watchdog loop (background task, spawn with tokio::spawn)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            timeout_secs = self.sync_timeout.as_secs(),
            session_ttl_secs = self.session_ttl.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Watchdog started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.wait() => {
                    info!("Watchdog stopped");
                    break;
                }
            }
        }
    }

    /// One scan. Returns the number of jobs timed out.
    pub async fn sweep(&self) -> usize {
        let idle_millis = self.sync_timeout.as_millis() as i64;
        let idle_secs = self.sync_timeout.as_secs();
        let mut timed_out = 0;

        for stalled in self.tracker.stalled(idle_millis) {
            let info = SyncError::Timeout { idle_secs }.to_info();
            // Another terminal state may have won the race
            let Some(snapshot) =
                self.tracker
                    .finish(&stalled.job_id, JobState::Error, Some(info.clone()))
            else {
                continue;
            };
            timed_out += 1;

            warn!(
                job_id = %snapshot.job_id,
                session_id = %snapshot.session_id,
                last_update = stalled.updated_at,
                "Sync job timed out"
            );

            let event = ProgressEvent {
                session_id: snapshot.session_id.clone(),
                job_id: snapshot.job_id.clone(),
                status: ProgressStatus::Error,
                current: snapshot.current,
                total: snapshot.total,
                message: info.detail.clone(),
                record: None,
                error: Some(info),
                timestamp: snapshot.updated_at,
            };
            if let Err(e) = self.broadcaster.publish(&snapshot.session_id, event).await {
                warn!(job_id = %snapshot.job_id, error = %e, "Failed to publish timeout event");
            }
        }

        for session_id in self
            .sessions
            .expire_idle(self.session_ttl.as_millis() as i64)
        {
            info!(session_id = %session_id, "Session expired after inactivity");
        }

        let pruned = self
            .tracker
            .prune_finished(self.retention.as_millis() as i64);
        if pruned > 0 {
            debug!(pruned = pruned, "Pruned finished job snapshots");
        }
        timed_out
    }
}
