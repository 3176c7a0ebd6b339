// Progress Broadcaster Port
// Fire-and-forget sink for progress events, addressed by session

use crate::domain::{ProgressEvent, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Publish failures. The pipeline logs these and never fails a job over them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Subscriber for session {0} is gone")]
    Closed(SessionId),

    #[error("Subscriber for session {0} is not keeping up, event dropped")]
    Lagging(SessionId),

    #[error("Publish failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ProgressBroadcaster: Send + Sync {
    async fn publish(&self, session_id: &str, event: ProgressEvent) -> Result<(), PublishError>;
}

/// Default per-subscriber buffer
pub const SUBSCRIBER_BUFFER: usize = 256;

/// In-process broadcaster: one bounded channel per subscribed session.
///
/// Events for sessions without a subscriber are dropped.
pub struct ChannelBroadcaster {
    subscribers: Mutex<HashMap<SessionId, mpsc::Sender<ProgressEvent>>>,
    buffer: usize,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::with_buffer(SUBSCRIBER_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Attach a subscriber, replacing any previous one for the session
    pub fn subscribe(&self, session_id: impl Into<SessionId>) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.into(), tx);
        rx
    }

    pub fn unsubscribe(&self, session_id: &str) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
    }

    fn sender(&self, session_id: &str) -> Option<mpsc::Sender<ProgressEvent>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressBroadcaster for ChannelBroadcaster {
    async fn publish(&self, session_id: &str, event: ProgressEvent) -> Result<(), PublishError> {
        let Some(tx) = self.sender(session_id) else {
            debug!(session_id = %session_id, "No subscriber, dropping progress event");
            return Ok(());
        };

        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(PublishError::Lagging(session_id.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.unsubscribe(session_id);
                Err(PublishError::Closed(session_id.to_string()))
            }
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ProgressStatus;

    /// Records every published event
    #[derive(Default)]
    pub struct RecordingBroadcaster {
        events: Mutex<Vec<ProgressEvent>>,
        failing: bool,
    }

    impl RecordingBroadcaster {
        pub fn new() -> Self {
            Self::default()
        }

        /// Records events but reports every publish as failed
        pub fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                failing: true,
            }
        }

        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn statuses(&self) -> Vec<ProgressStatus> {
            self.events().iter().map(|e| e.status).collect()
        }

        pub fn messages(&self) -> Vec<String> {
            self.events().into_iter().map(|e| e.message).collect()
        }
    }

    #[async_trait]
    impl ProgressBroadcaster for RecordingBroadcaster {
        async fn publish(
            &self,
            _session_id: &str,
            event: ProgressEvent,
        ) -> Result<(), PublishError> {
            self.events.lock().unwrap().push(event);
            if self.failing {
                return Err(PublishError::Transport("socket closed".to_string()));
            }
            Ok(())
        }
    }
}
