// Session Registry Port
// The connection layer owns registration; the pipeline checks liveness and
// the watchdog expires sessions whose client stopped showing up

use crate::domain::SessionId;
use crate::port::TimeProvider;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub trait SessionRegistry: Send + Sync {
    fn is_active(&self, session_id: &str) -> bool;

    /// Record client activity. Returns false if the session is not open.
    fn touch(&self, session_id: &str) -> bool;

    /// Close every session not touched for more than `idle_millis`
    fn expire_idle(&self, idle_millis: i64) -> Vec<SessionId>;
}

/// Thread-safe map of live sessions to their last activity (epoch millis)
pub struct InMemorySessionRegistry {
    sessions: RwLock<HashMap<SessionId, i64>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemorySessionRegistry {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            time_provider,
        }
    }

    /// Returns false if the session was already registered
    pub fn register(&self, session_id: impl Into<SessionId>) -> bool {
        let now = self.time_provider.now_millis();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.entry(session_id.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Returns false if the session was not registered
    pub fn unregister(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    fn is_active(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(session_id)
    }

    fn touch(&self, session_id: &str) -> bool {
        let now = self.time_provider.now_millis();
        match self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(session_id)
        {
            Some(last_seen) => {
                *last_seen = now;
                true
            }
            None => false,
        }
    }

    fn expire_idle(&self, idle_millis: i64) -> Vec<SessionId> {
        let now = self.time_provider.now_millis();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, last_seen)| now - **last_seen > idle_millis)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }
}
