//! Conversation transcripts and the session store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::EvictionPolicy;
use crate::llm::{Role, Turn};

/// Ordered turns of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns in conversation order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether the last turn is a user turn with no reply.
    #[must_use]
    pub fn has_dangling_user_turn(&self) -> bool {
        self.turns.last().is_some_and(|t| t.role == Role::User)
    }
}

/// Exclusive access to a session's transcript.
///
/// Other requests on the same session wait until this guard is dropped.
pub type TranscriptGuard<'a> = MutexGuard<'a, Transcript>;

/// Handle to a single conversation session.
///
/// Cloning is cheap; all clones share the same transcript.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    transcript: Mutex<Transcript>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Session {
    pub(crate) fn new(id: String) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                transcript: Mutex::new(Transcript::default()),
                last_activity: RwLock::new(Utc::now()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Enter the session's critical section.
    pub async fn lock(&self) -> TranscriptGuard<'_> {
        let guard = self.inner.transcript.lock().await;
        self.touch();
        guard
    }

    /// Copy of the current turns. Waits for any in-flight request.
    pub async fn turns(&self) -> Vec<Turn> {
        self.inner.transcript.lock().await.turns().to_vec()
    }

    /// Whether a request currently holds the transcript.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.transcript.try_lock().is_err()
    }

    /// Whether both handles refer to the same session.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .inner
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since last activity, as of `now`.
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        // Negative means clock skew; treat as fresh.
        (now - self.last_activity()).to_std().unwrap_or_default()
    }

    fn touch(&self) {
        self.touch_at(Utc::now());
    }

    pub(crate) fn touch_at(&self, at: DateTime<Utc>) {
        let mut guard = self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = at;
    }
}

/// Thread-safe store of sessions keyed by client-supplied id.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
    policy: EvictionPolicy,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a store that never evicts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(EvictionPolicy::unbounded())
    }

    /// Create a store governed by `policy`.
    #[must_use]
    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                policy,
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.inner.policy
    }

    /// Get a session by id, registering an empty one on first use.
    ///
    /// Concurrent first uses of the same id all receive the same session.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.get(id) {
            session.touch();
            return session;
        }

        let mut guard = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = guard.get(id) {
            session.touch();
            return session.clone();
        }

        let session = Session::new(id.to_string());
        guard.insert(id.to_string(), session.clone());
        debug!(name: "session.created", session_id = %id, "Session created");

        if self.inner.policy.max_sessions.is_some() {
            let victims = self
                .inner
                .policy
                .select_victims(&guard, Utc::now(), Some(id));
            Self::remove_victims(&mut guard, &victims);
        }

        session
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Drop a session and its transcript.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Apply the eviction policy now.
    ///
    /// Returns the number of sessions removed.
    pub fn evict_if_needed(&self) -> usize {
        self.evict_at(Utc::now())
    }

    /// Apply the eviction policy as of `now`.
    pub fn evict_at(&self, now: DateTime<Utc>) -> usize {
        if self.inner.policy.is_unbounded() {
            return 0;
        }
        let mut guard = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let victims = self.inner.policy.select_victims(&guard, now, None);
        Self::remove_victims(&mut guard, &victims)
    }

    fn remove_victims(sessions: &mut HashMap<String, Session>, victims: &[String]) -> usize {
        for id in victims {
            sessions.remove(id);
            debug!(name: "session.evicted", session_id = %id, "Session evicted");
        }
        victims.len()
    }
}
