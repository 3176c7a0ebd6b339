// Contact Store Port (Interface)

use crate::domain::{CandidateRecord, ExistingRecord, FieldSet, RecordId, StoreCredentials};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Contact store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Store rejected the payload: {0}")]
    Schema(String),

    #[error("Invalid store credentials: {0}")]
    InvalidCredentials(String),
}

impl StoreError {
    /// Transport failures and non-2xx responses are retried; schema and
    /// credential problems will not improve on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Status { .. })
    }
}

/// Remote contact store
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Add whatever contact properties the store lacks, returning their names
    async fn ensure_schema(&self) -> Result<Vec<String>, StoreError>;

    /// Fetch every stored record (one snapshot per job)
    async fn fetch_all(&self) -> Result<Vec<ExistingRecord>, StoreError>;

    /// Create a record from a candidate, returning the new store ID
    async fn create(&self, record: &CandidateRecord) -> Result<RecordId, StoreError>;

    /// Write only the given fields of an existing record
    async fn update(&self, id: &RecordId, changes: &FieldSet) -> Result<(), StoreError>;
}

/// Builds a store client from per-request credentials
pub trait ContactStoreFactory: Send + Sync {
    fn connect(&self, credentials: &StoreCredentials) -> Result<Arc<dyn ContactStore>, StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// A call observed by the mock store
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StoreCall {
        Create { match_key: String, name: String },
        Update { id: RecordId, changes: FieldSet },
    }

    type MutationHook = Box<dyn Fn(usize) + Send + Sync>;

    #[derive(Default)]
    struct MockState {
        records: Vec<ExistingRecord>,
        next_id: u64,
        scripted: VecDeque<StoreError>,
        failing: HashMap<String, StoreError>,
        fetch_error: Option<StoreError>,
        missing_properties: Vec<String>,
        schema_checks: usize,
        calls: Vec<StoreCall>,
        mutations: usize,
    }

    /// In-memory contact store with scripted failures
    #[derive(Default)]
    pub struct MockContactStore {
        state: Mutex<MockState>,
        on_mutation: Mutex<Option<MutationHook>>,
    }

    impl MockContactStore {
        pub fn new(records: Vec<ExistingRecord>) -> Self {
            Self {
                state: Mutex::new(MockState {
                    next_id: records.len() as u64 + 1,
                    records,
                    ..Default::default()
                }),
                on_mutation: Mutex::new(None),
            }
        }

        /// Fail the next mutation call (FIFO) with `err`
        pub fn fail_next(&self, err: StoreError) {
            self.state.lock().unwrap().scripted.push_back(err);
        }

        /// Fail every mutation for a match key (creates) or record ID (updates)
        pub fn fail_always_for(&self, key_or_id: impl Into<String>, err: StoreError) {
            self.state
                .lock()
                .unwrap()
                .failing
                .insert(key_or_id.into(), err);
        }

        /// Properties the next schema check reports as added
        pub fn missing_properties(&self, names: &[&str]) {
            self.state.lock().unwrap().missing_properties =
                names.iter().map(|n| n.to_string()).collect();
        }

        pub fn schema_checks(&self) -> usize {
            self.state.lock().unwrap().schema_checks
        }

        /// Fail reads: fetches and schema checks
        pub fn fail_fetch(&self, err: StoreError) {
            self.state.lock().unwrap().fetch_error = Some(err);
        }

        /// Called with the running count after each successful mutation
        pub fn on_mutation(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
            *self.on_mutation.lock().unwrap() = Some(Box::new(hook));
        }

        pub fn calls(&self) -> Vec<StoreCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn records(&self) -> Vec<ExistingRecord> {
            self.state.lock().unwrap().records.clone()
        }

        pub fn mutation_count(&self) -> usize {
            self.state.lock().unwrap().mutations
        }

        fn check_failure(state: &mut MockState, key: &str) -> Result<(), StoreError> {
            if let Some(err) = state.scripted.pop_front() {
                return Err(err);
            }
            if let Some(err) = state.failing.get(key) {
                return Err(err.clone());
            }
            Ok(())
        }

        fn notify(&self, count: usize) {
            if let Some(hook) = self.on_mutation.lock().unwrap().as_ref() {
                hook(count);
            }
        }
    }

    #[async_trait]
    impl ContactStore for MockContactStore {
        async fn ensure_schema(&self) -> Result<Vec<String>, StoreError> {
            let mut state = self.state.lock().unwrap();
            state.schema_checks += 1;
            if let Some(err) = &state.fetch_error {
                return Err(err.clone());
            }
            Ok(std::mem::take(&mut state.missing_properties))
        }

        async fn fetch_all(&self) -> Result<Vec<ExistingRecord>, StoreError> {
            let state = self.state.lock().unwrap();
            match &state.fetch_error {
                Some(err) => Err(err.clone()),
                None => Ok(state.records.clone()),
            }
        }

        async fn create(&self, record: &CandidateRecord) -> Result<RecordId, StoreError> {
            let (count, id) = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(StoreCall::Create {
                    match_key: record.match_key.clone(),
                    name: record.fields.name.clone(),
                });
                Self::check_failure(&mut state, record.match_key.trim())?;

                let id = format!("rec-{}", state.next_id);
                state.next_id += 1;
                state
                    .records
                    .push(ExistingRecord::from_candidate(id.clone(), record));
                state.mutations += 1;
                (state.mutations, id)
            };
            self.notify(count);
            Ok(id)
        }

        async fn update(&self, id: &RecordId, changes: &FieldSet) -> Result<(), StoreError> {
            let count = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(StoreCall::Update {
                    id: id.clone(),
                    changes: changes.clone(),
                });
                Self::check_failure(&mut state, id)?;

                let record = state
                    .records
                    .iter_mut()
                    .find(|r| &r.id == id)
                    .ok_or_else(|| StoreError::Status {
                        status: 404,
                        message: format!("record {} not found", id),
                    })?;
                record.apply(changes);
                state.mutations += 1;
                state.mutations
            };
            self.notify(count);
            Ok(())
        }
    }

    /// Factory handing out a shared mock store
    pub struct MockContactStoreFactory {
        store: Arc<MockContactStore>,
        connect_error: Option<StoreError>,
    }

    impl MockContactStoreFactory {
        pub fn new(store: Arc<MockContactStore>) -> Self {
            Self {
                store,
                connect_error: None,
            }
        }

        pub fn failing(err: StoreError) -> Self {
            Self {
                store: Arc::new(MockContactStore::default()),
                connect_error: Some(err),
            }
        }
    }

    impl ContactStoreFactory for MockContactStoreFactory {
        fn connect(
            &self,
            _credentials: &StoreCredentials,
        ) -> Result<Arc<dyn ContactStore>, StoreError> {
            match &self.connect_error {
                Some(err) => Err(err.clone()),
                None => Ok(self.store.clone()),
            }
        }
    }
}
