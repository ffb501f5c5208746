//! Per-user session state
//!
//! The store maps a chat user id to the backend conversation handle and the
//! spend accumulated on it. Entries are created on the first prompt and removed
//! on reset or when the backend reports the conversation gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::identifiers::SessionId;

/// Session state for one chat user
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    /// Conversation handle, absent until the backend assigns one
    pub session_id: Option<SessionId>,
    /// Accumulated spend in USD; never decreases
    pub total_cost: f64,
    /// Number of completed prompts
    pub prompt_count: u32,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the last prompt completed
    pub last_active: DateTime<Utc>,
    /// Store-unique generation of this entry
    pub(crate) epoch: u64,
}

/// In-memory map of user id to [`UserSession`]
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, UserSession>>,
    next_epoch: AtomicU64,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's session
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.lock().get(user_id).cloned()
    }

    /// Insert a fresh session unless one already exists, returning the stored entry
    pub fn insert_if_absent(&self, user_id: &str, session_id: Option<SessionId>) -> UserSession {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let now = Utc::now();
                UserSession {
                    session_id,
                    total_cost: 0.0,
                    prompt_count: 0,
                    created_at: now,
                    last_active: now,
                    epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
                }
            })
            .clone()
    }

    /// Record a completed prompt against the session generation `epoch`
    ///
    /// Adds `cost_usd` (ignored unless finite and positive) and refreshes the
    /// handle when the backend reported one. Returns `false` without touching
    /// anything when the entry was removed or replaced meanwhile.
    pub fn record(
        &self,
        user_id: &str,
        epoch: u64,
        session_id: Option<SessionId>,
        cost_usd: f64,
    ) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(user_id).filter(|s| s.epoch == epoch) else {
            return false;
        };

        if cost_usd.is_finite() && cost_usd > 0.0 {
            session.total_cost += cost_usd;
        }
        if let Some(id) = session_id {
            if session.session_id.as_ref() != Some(&id) {
                log::debug!("Session handle for {user_id} is now {id}");
            }
            session.session_id = Some(id);
        }
        session.prompt_count += 1;
        session.last_active = Utc::now();
        true
    }

    /// Remove and return the user's session
    pub fn remove(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.lock().remove(user_id)
    }

    /// Number of stored sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the store holds no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_and_refreshes_handle() {
        let store = SessionStore::new();
        let session = store.insert_if_absent("u1", None);

        assert!(store.record("u1", session.epoch, Some(SessionId::new("a")), 0.01));
        assert!(store.record("u1", session.epoch, Some(SessionId::new("b")), 0.02));

        let Some(stored) = store.get("u1") else {
            panic!("session should exist");
        };
        assert!((stored.total_cost - 0.03).abs() < 1e-9);
        assert_eq!(stored.session_id, Some(SessionId::new("b")));
        assert_eq!(stored.prompt_count, 2);
    }

    #[test]
    fn cost_never_decreases() {
        let store = SessionStore::new();
        let session = store.insert_if_absent("u1", None);
        store.record("u1", session.epoch, None, 0.5);
        store.record("u1", session.epoch, None, -0.4);
        store.record("u1", session.epoch, None, f64::NAN);

        assert_eq!(store.get("u1").map(|s| s.total_cost), Some(0.5));
    }

    #[test]
    fn stale_epoch_is_ignored() {
        let store = SessionStore::new();
        let old = store.insert_if_absent("u1", Some(SessionId::new("old")));
        store.remove("u1");
        let new = store.insert_if_absent("u1", None);

        assert_ne!(old.epoch, new.epoch);
        assert!(!store.record("u1", old.epoch, Some(SessionId::new("old")), 1.0));
        assert_eq!(store.get("u1").map(|s| s.total_cost), Some(0.0));
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let store = SessionStore::new();
        let first = store.insert_if_absent("u1", Some(SessionId::new("a")));
        let second = store.insert_if_absent("u1", Some(SessionId::new("b")));
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }
}
