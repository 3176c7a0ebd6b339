//! Shared test fixture: a real pipeline over in-memory fakes

use crate::handler::RpcHandler;
use crate::session::SessionHub;
use contactsync_core::application::{
    JobTracker, PipelineConfig, PipelineDeps, RetryPolicy, SyncService, SyncWorker,
};
use contactsync_core::domain::{CandidateRecord, ContactFields};
use contactsync_core::port::candidate_source::mocks::MockCandidateSource;
use contactsync_core::port::contact_store::mocks::{MockContactStore, MockContactStoreFactory};
use contactsync_core::port::id_provider::mocks::SequentialIdProvider;
use contactsync_core::port::time_provider::mocks::FixedTimeProvider;
use contactsync_core::port::{ChannelBroadcaster, InMemorySessionRegistry};
use contactsync_infra_csv::UploadStaging;
use std::sync::Arc;

pub(crate) struct Fixture {
    pub handler: RpcHandler,
    pub worker: SyncWorker,
    pub store: Arc<MockContactStore>,
    pub _uploads: tempfile::TempDir,
}

/// One candidate ("Ada Lovelace") is parsed from any submitted file
pub(crate) fn fixture() -> Fixture {
    let clock = Arc::new(FixedTimeProvider::new(1_700_000_000_000));
    let registry = Arc::new(InMemorySessionRegistry::new(clock.clone()));
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let store = Arc::new(MockContactStore::default());
    let source = MockCandidateSource::new(vec![CandidateRecord::new(
        "https://www.linkedin.com/in/ada",
        ContactFields {
            name: "Ada Lovelace".to_string(),
            ..Default::default()
        },
    )]);

    let deps = PipelineDeps {
        store_factory: Arc::new(MockContactStoreFactory::new(store.clone())),
        source: Arc::new(source),
        broadcaster: broadcaster.clone(),
        sessions: registry.clone(),
        tracker: Arc::new(JobTracker::new(clock.clone())),
        time_provider: clock,
    };
    let config = PipelineConfig {
        retry_policy: RetryPolicy::immediate(2),
        ..Default::default()
    };
    let pipeline = SyncService::build(deps, Arc::new(SequentialIdProvider::new("job")), config);

    let uploads = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionHub::new(
        registry,
        broadcaster,
        Arc::new(SequentialIdProvider::new("session")),
    ));
    let handler = RpcHandler::new(
        pipeline.service,
        sessions,
        UploadStaging::new(uploads.path().join("staged")),
    );

    Fixture {
        handler,
        worker: pipeline.worker,
        store,
        _uploads: uploads,
    }
}
