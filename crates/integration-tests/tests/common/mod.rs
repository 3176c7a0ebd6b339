//! Shared wiring: real CSV source and staging, in-memory store and broadcaster

#![allow(dead_code)]

use contactsync_core::application::{
    JobTracker, PipelineConfig, PipelineDeps, RetryPolicy, SyncService, SyncWorker, Watchdog,
};
use contactsync_core::domain::{ProgressSnapshot, StoreCredentials, UploadedFile};
use contactsync_core::port::contact_store::mocks::{MockContactStore, MockContactStoreFactory};
use contactsync_core::port::id_provider::mocks::SequentialIdProvider;
use contactsync_core::port::progress_broadcaster::mocks::RecordingBroadcaster;
use contactsync_core::port::time_provider::mocks::FixedTimeProvider;
use contactsync_core::port::InMemorySessionRegistry;
use contactsync_infra_csv::{LinkedInCsvSource, UploadStaging};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const SESSION: &str = "session-1";

/// A LinkedIn export with the usual preamble
pub const EXPORT: &str = "\
Notes:
\"When exporting your connection data, you may notice that some of the email addresses are missing.\"

First Name,Last Name,URL,Email Address,Company,Position,Connected On
Ada,Lovelace,https://www.linkedin.com/in/ada,ada@example.com,Analytical Engines,Mathematician,15 Mar 2023
Grace,Hopper,https://www.linkedin.com/in/grace,,US Navy,Rear Admiral,01 Apr 2023
Alan,Turing,https://www.linkedin.com/in/alan,,Bletchley Park,Cryptanalyst,02 May 2023
";

pub struct Env {
    pub service: Arc<SyncService>,
    pub worker: Option<SyncWorker>,
    pub watchdog: Arc<Watchdog>,
    pub store: Arc<MockContactStore>,
    pub sessions: Arc<InMemorySessionRegistry>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub clock: Arc<FixedTimeProvider>,
    pub staging: UploadStaging,
    pub dir: tempfile::TempDir,
}

pub fn env(store: MockContactStore) -> Env {
    env_with(store, PipelineConfig::default())
}

pub fn env_with(store: MockContactStore, config: PipelineConfig) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedTimeProvider::new(1_700_000_000_000));
    let store = Arc::new(store);
    let sessions = Arc::new(InMemorySessionRegistry::new(clock.clone()));
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    sessions.register(SESSION);

    let deps = PipelineDeps {
        store_factory: Arc::new(MockContactStoreFactory::new(store.clone())),
        source: Arc::new(LinkedInCsvSource::new()),
        broadcaster: broadcaster.clone(),
        sessions: sessions.clone(),
        tracker: Arc::new(JobTracker::new(clock.clone())),
        time_provider: clock.clone(),
    };
    let config = PipelineConfig {
        retry_policy: RetryPolicy::immediate(3),
        ..config
    };
    let pipeline = SyncService::build(deps, Arc::new(SequentialIdProvider::new("job")), config);

    Env {
        service: pipeline.service,
        worker: Some(pipeline.worker),
        watchdog: Arc::new(pipeline.watchdog),
        store,
        sessions,
        broadcaster,
        clock,
        staging: UploadStaging::new(dir.path().join("uploads")),
        dir,
    }
}

impl Env {
    pub fn export(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub async fn stage(&self, content: &str) -> UploadedFile {
        let path = self.export("Connections.csv", content);
        self.staging.stage(&path).await.unwrap()
    }

    pub async fn submit(&self, content: &str) -> String {
        let upload = self.stage(content).await;
        self.service
            .submit_sync(SESSION, credentials(), upload)
            .await
            .unwrap()
    }

    pub fn status(&self, job_id: &str) -> ProgressSnapshot {
        self.service.job_status(job_id).unwrap()
    }

    /// Run one queued job on the test task
    pub async fn process_next(&mut self) -> bool {
        match self.worker.as_mut() {
            Some(worker) => worker.process_next().await,
            None => false,
        }
    }

    /// Files still sitting in the upload directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging.dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn credentials() -> StoreCredentials {
    StoreCredentials::new("secret_token", "db-1")
}

/// Poll the tracker until the job is terminal
pub async fn wait_terminal(service: &SyncService, job_id: &str) -> ProgressSnapshot {
    for _ in 0..200 {
        let snapshot = service.job_status(job_id).unwrap();
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}

