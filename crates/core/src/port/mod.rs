// Port Layer - Interfaces for external collaborators

pub mod candidate_source;
pub mod contact_store;
pub mod id_provider; // For deterministic testing
pub mod progress_broadcaster;
pub mod session_registry;
pub mod time_provider;

// Re-exports
pub use candidate_source::{CandidateSource, SourceError};
pub use contact_store::{ContactStore, ContactStoreFactory, StoreError};
pub use id_provider::IdProvider;
pub use progress_broadcaster::{ChannelBroadcaster, ProgressBroadcaster, PublishError};
pub use session_registry::{InMemorySessionRegistry, SessionRegistry};
pub use time_provider::TimeProvider;
