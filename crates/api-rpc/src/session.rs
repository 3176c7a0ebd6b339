//! Session hub
//!
//! Owns session registration and the progress channel of each session.
//! Closing a session is how a client cancels its jobs.

use contactsync_core::domain::{ProgressEvent, SessionId};
use contactsync_core::port::{ChannelBroadcaster, IdProvider, InMemorySessionRegistry, SessionRegistry};
use contactsync_core::{Result, SyncError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub struct SessionHub {
    registry: Arc<InMemorySessionRegistry>,
    broadcaster: Arc<ChannelBroadcaster>,
    id_provider: Arc<dyn IdProvider>,
}

impl SessionHub {
    pub fn new(
        registry: Arc<InMemorySessionRegistry>,
        broadcaster: Arc<ChannelBroadcaster>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            id_provider,
        }
    }

    pub fn open(&self) -> SessionId {
        let session_id = self.id_provider.generate_id();
        self.registry.register(session_id.clone());
        info!(session_id = %session_id, "Session opened");
        session_id
    }

    /// Unregister and drop the subscriber. Returns false if it was not open.
    pub fn close(&self, session_id: &str) -> bool {
        self.broadcaster.unsubscribe(session_id);
        let closed = self.registry.unregister(session_id);
        if closed {
            info!(session_id = %session_id, "Session closed");
        }
        closed
    }

    /// Progress stream for an open session
    pub fn subscribe(&self, session_id: &str) -> Result<mpsc::Receiver<ProgressEvent>> {
        if !self.registry.is_active(session_id) {
            return Err(SyncError::Validation(format!(
                "Session {} is not open",
                session_id
            )));
        }
        Ok(self.broadcaster.subscribe(session_id))
    }

    /// Record client activity; false if the session is not open
    pub fn touch(&self, session_id: &str) -> bool {
        self.registry.touch(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactsync_core::domain::ProgressStatus;
    use contactsync_core::port::id_provider::mocks::SequentialIdProvider;
    use contactsync_core::port::time_provider::mocks::FixedTimeProvider;
    use contactsync_core::port::ProgressBroadcaster;

    fn hub() -> (Arc<ChannelBroadcaster>, SessionHub) {
        let broadcaster = Arc::new(ChannelBroadcaster::new());
        let hub = SessionHub::new(
            Arc::new(InMemorySessionRegistry::new(Arc::new(FixedTimeProvider::new(0)))),
            broadcaster.clone(),
            Arc::new(SequentialIdProvider::new("session")),
        );
        (broadcaster, hub)
    }

    #[tokio::test]
    async fn test_subscribe_receives_session_events() {
        let (broadcaster, hub) = hub();
        let session = hub.open();
        let mut rx = hub.subscribe(&session).unwrap();

        let event = ProgressEvent {
            session_id: session.clone(),
            job_id: "job-1".to_string(),
            status: ProgressStatus::Queued,
            current: 0,
            total: 0,
            message: "Queued for sync (position 1)".to_string(),
            record: None,
            error: None,
            timestamp: 0,
        };
        broadcaster.publish(&session, event.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (_, hub) = hub();
        let session = hub.open();
        let mut rx = hub.subscribe(&session).unwrap();

        assert!(hub.close(&session));
        assert!(!hub.close(&session));
        assert_eq!(rx.recv().await, None);
        assert_eq!(hub.active_sessions(), 0);
    }

    #[test]
    fn test_touch_only_open_sessions() {
        let (_, hub) = hub();
        let session = hub.open();
        assert!(hub.touch(&session));
        hub.close(&session);
        assert!(!hub.touch(&session));
    }

    #[test]
    fn test_subscribe_requires_open_session() {
        let (_, hub) = hub();
        assert!(matches!(
            hub.subscribe("nope"),
            Err(SyncError::Validation(_))
        ));
    }
}
