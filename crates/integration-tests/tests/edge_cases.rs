//! Interruptions, timeouts, capacity and overdue evaluation

mod common;

use chrono::NaiveDate;
use common::{credentials, env, env_with, EXPORT, SESSION};
use contactsync_core::application::PipelineConfig;
use contactsync_core::domain::{
    Cadence, ContactFields, ErrorKind, ExistingRecord, FieldChange, JobState, ProgressStatus,
};
use contactsync_core::port::contact_store::mocks::{MockContactStore, StoreCall};
use contactsync_core::port::{SessionRegistry, StoreError};

#[tokio::test]
async fn test_closing_session_abandons_job() {
    let mut env = env(MockContactStore::default());
    let sessions = env.sessions.clone();
    env.store.on_mutation(move |count| {
        if count == 1 {
            sessions.unregister(SESSION);
        }
    });

    let job_id = env.submit(EXPORT).await;
    assert!(env.process_next().await);

    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Abandoned);
    assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Abandoned);
    assert_eq!(env.store.mutation_count(), 1, "no writes after the session closed");
    assert_eq!(env.staged_files(), 0);
    assert!(!env
        .broadcaster
        .statuses()
        .contains(&ProgressStatus::Completed));
}

// The watchdog sweeps from inside the store call, so the job stalls mid-run
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watchdog_times_out_stalled_job() {
    let mut env = env(MockContactStore::default());
    let clock = env.clock.clone();
    let watchdog = env.watchdog.clone();
    env.store.on_mutation(move |count| {
        if count == 1 {
            clock.advance(600_001);
            let timed_out = tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(watchdog.sweep())
            });
            assert_eq!(timed_out, 1);
        }
    });

    let job_id = env.submit(EXPORT).await;
    assert!(env.process_next().await);

    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Error);
    assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Timeout);
    assert_eq!(env.broadcaster.statuses().last(), Some(&ProgressStatus::Error));

    // The worker sees the terminal state and stops writing
    assert_eq!(env.store.mutation_count(), 1);
    assert_eq!(env.status(&job_id).state, JobState::Error);
    assert_eq!(env.staged_files(), 0);
}

#[tokio::test]
async fn test_queued_job_outlives_sync_timeout() {
    let mut env = env(MockContactStore::default());
    let job_id = env.submit(EXPORT).await;

    // Waiting in the queue is not a stall, however long it takes
    env.clock.advance(700_000);
    assert_eq!(env.watchdog.sweep().await, 0);
    assert_eq!(env.status(&job_id).state, JobState::Queued);

    assert!(env.process_next().await);
    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counts.added, 3);
}

#[tokio::test]
async fn test_expired_session_abandons_queued_job() {
    let mut env = env(MockContactStore::default());
    let job_id = env.submit(EXPORT).await;

    env.clock.advance(900_001);
    env.watchdog.sweep().await;
    assert!(!env.sessions.is_active(SESSION));

    assert!(env.process_next().await);
    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Abandoned);
    assert!(env.store.calls().is_empty());
    assert_eq!(env.staged_files(), 0);
}

#[tokio::test]
async fn test_session_closed_during_last_item_completes() {
    let mut env = env(MockContactStore::default());
    let sessions = env.sessions.clone();
    env.store.on_mutation(move |count| {
        if count == 3 {
            sessions.unregister(SESSION);
        }
    });

    let job_id = env.submit(EXPORT).await;
    assert!(env.process_next().await);

    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counts.added, 3);
    assert_eq!(env.store.records().len(), 3);
}

#[tokio::test]
async fn test_queue_full_rejects_and_releases_upload() {
    let config = PipelineConfig {
        queue_capacity: 1,
        ..Default::default()
    };
    let env = env_with(MockContactStore::default(), config);

    env.submit(EXPORT).await;
    assert_eq!(env.service.queue_depth(), 1);

    let upload = env.stage(EXPORT).await;
    let err = env
        .service
        .submit_sync(SESSION, credentials(), upload)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueueFull);
    assert_eq!(env.staged_files(), 1, "only the queued job's upload remains");
}

#[tokio::test]
async fn test_slot_frees_after_job_finishes() {
    let config = PipelineConfig {
        queue_capacity: 1,
        ..Default::default()
    };
    let mut env = env_with(MockContactStore::default(), config);

    env.submit(EXPORT).await;
    assert!(env.process_next().await);
    assert_eq!(env.service.queue_depth(), 0);

    let second = env.submit(EXPORT).await;
    assert_eq!(env.status(&second).state, JobState::Queued);
}

#[tokio::test]
async fn test_submit_requires_open_session() {
    let env = env(MockContactStore::default());
    let upload = env.stage(EXPORT).await;

    let err = env
        .service
        .submit_sync("session-unknown", credentials(), upload)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(env.staged_files(), 0);
}

#[tokio::test]
async fn test_non_csv_upload_rejected() {
    let env = env(MockContactStore::default());
    let path = env.export("Connections.xlsx", EXPORT);

    let err = env.staging.stage(&path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(env.staged_files(), 0);
}

#[tokio::test]
async fn test_failing_contact_does_not_stop_import() {
    let store = MockContactStore::default();
    store.fail_always_for(
        "https://www.linkedin.com/in/grace",
        StoreError::Status {
            status: 503,
            message: "unavailable".to_string(),
        },
    );
    let mut env = env(store);

    let job_id = env.submit(EXPORT).await;
    assert!(env.process_next().await);

    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counts.added, 2);
    assert_eq!(snapshot.counts.failed, 1);
    assert_eq!(snapshot.item_errors.len(), 1);
    assert_eq!(snapshot.item_errors[0].record, "Grace Hopper");
    assert_eq!(snapshot.item_errors[0].index, 2);
    assert_eq!(snapshot.item_errors[0].kind, ErrorKind::RetryFailed);
    assert_eq!(snapshot.item_errors[0].attempts, 3);

    let retries = env
        .broadcaster
        .statuses()
        .into_iter()
        .filter(|s| *s == ProgressStatus::Retrying)
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn test_unreachable_store_fails_job() {
    let store = MockContactStore::default();
    store.fail_fetch(StoreError::Transport("connection refused".to_string()));
    let mut env = env(store);

    let job_id = env.submit(EXPORT).await;
    assert!(env.process_next().await);

    let snapshot = env.status(&job_id);
    assert_eq!(snapshot.state, JobState::Error);
    assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Upstream);
    assert!(env.store.calls().is_empty());
}

fn contact(id: &str, last_contacted: Option<NaiveDate>, cadence: Option<Cadence>, overdue: bool) -> ExistingRecord {
    ExistingRecord {
        id: id.to_string(),
        match_key: format!("https://www.linkedin.com/in/{}", id),
        fields: ContactFields {
            name: id.to_string(),
            last_contacted,
            cadence,
            ..Default::default()
        },
        overdue,
    }
}

#[tokio::test]
async fn test_overdue_evaluation_writes_changed_flags() {
    let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d);
    let store = MockContactStore::new(vec![
        contact("weekly-late", date(5, 1), Some(Cadence::Weekly), false),
        contact("monthly-fresh", date(5, 20), Some(Cadence::Monthly), false),
        contact("caught-up", date(5, 25), Some(Cadence::Quarterly), true),
        contact("no-cadence", date(1, 1), None, false),
        contact("never-contacted", None, Some(Cadence::Monthly), false),
    ]);
    let env = env(store);
    env.clock.set(
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap(),
    );

    let summary = env.service.evaluate_overdue(&credentials()).await.unwrap();
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 0);

    let written: Vec<(String, Vec<FieldChange>)> = env
        .store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Update { id, changes } => Some((id, changes.iter().cloned().collect())),
            _ => None,
        })
        .collect();
    assert_eq!(
        written,
        vec![
            ("weekly-late".to_string(), vec![FieldChange::Overdue(true)]),
            ("caught-up".to_string(), vec![FieldChange::Overdue(false)]),
        ]
    );
}

#[tokio::test]
async fn test_overdue_write_failure_is_counted() {
    let store = MockContactStore::new(vec![contact(
        "weekly-late",
        NaiveDate::from_ymd_opt(2023, 1, 1),
        Some(Cadence::Weekly),
        false,
    )]);
    store.fail_always_for(
        "weekly-late",
        StoreError::Status {
            status: 429,
            message: "rate limited".to_string(),
        },
    );
    let env = env(store);

    let summary = env.service.evaluate_overdue(&credentials()).await.unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed, 1);
    assert!(!env.store.records()[0].overdue);
}
