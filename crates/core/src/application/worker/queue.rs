// Bounded job queue: non-blocking submit, single consumer

use crate::domain::SyncJob;
use crate::error::{Result, SyncError};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// A job together with the capacity slot it occupies.
///
/// The slot is freed when this value is dropped, i.e. once the worker is
/// done with the job, so capacity covers queued and in-flight jobs alike.
pub struct QueuedJob {
    pub job: SyncJob,
    _slot: OwnedSemaphorePermit,
}

/// Capacity reserved for one job that has not been sent yet
#[derive(Debug)]
pub struct QueueSlot {
    permit: OwnedSemaphorePermit,
    sender: mpsc::Sender<QueuedJob>,
    /// 1-based position among occupied slots at reservation time
    pub position: usize,
}

impl QueueSlot {
    /// Hand the job to the worker
    pub fn send(self, job: SyncJob) -> Result<()> {
        let queued = QueuedJob {
            job,
            _slot: self.permit,
        };
        // Capacity is enforced by the permit, so only a closed channel fails
        self.sender
            .try_send(queued)
            .map_err(|_| SyncError::Internal("sync worker is not running".to_string()))
    }
}

/// Producer side of the job queue
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// Consumer side, owned by the single worker
pub type JobReceiver = mpsc::Receiver<QueuedJob>;

impl JobQueue {
    pub fn bounded(capacity: usize) -> (Self, JobReceiver) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Self {
            sender,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        };
        (queue, receiver)
    }

    /// Reserve a slot without waiting; fails fast with QueueFull
    pub fn reserve(&self) -> Result<QueueSlot> {
        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| SyncError::QueueFull {
                capacity: self.capacity,
            })?;
        Ok(QueueSlot {
            permit,
            sender: self.sender.clone(),
            position: self.occupied(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs currently queued or running
    pub fn occupied(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoreCredentials, UploadedFile};
    use tokio_test::{assert_err, assert_ok};

    fn job(n: usize) -> SyncJob {
        SyncJob::new(
            format!("job-{}", n),
            0,
            "s1",
            StoreCredentials::new("token", "db"),
            UploadedFile::detached("/tmp/none.csv"),
        )
    }

    #[tokio::test]
    async fn test_capacity_counts_until_job_dropped() {
        let (queue, mut receiver) = JobQueue::bounded(2);

        let first = queue.reserve().unwrap();
        assert_eq!(first.position, 1);
        first.send(job(1)).unwrap();
        queue.reserve().unwrap().send(job(2)).unwrap();

        assert!(matches!(
            queue.reserve(),
            Err(SyncError::QueueFull { capacity: 2 })
        ));

        // Receiving alone does not free the slot; finishing the job does
        let running = receiver.recv().await.unwrap();
        assert_err!(queue.reserve());
        drop(running);
        assert_eq!(queue.occupied(), 1);
        assert_ok!(queue.reserve());
    }

    #[tokio::test]
    async fn test_send_fails_without_worker() {
        let (queue, receiver) = JobQueue::bounded(1);
        drop(receiver);
        let slot = queue.reserve().unwrap();
        assert!(matches!(slot.send(job(1)), Err(SyncError::Internal(_))));
        // The rejected job released its slot
        assert_eq!(queue.occupied(), 0);
    }
}
