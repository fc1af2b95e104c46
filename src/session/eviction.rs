//! Session eviction policy.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::Session;

/// Limits applied by [`SessionStore::evict_if_needed`](super::SessionStore::evict_if_needed).
///
/// Both limits are optional; the default policy never evicts. Sessions with
/// a request in flight are skipped by both rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Keep at most this many sessions, dropping the least recently used.
    pub max_sessions: Option<usize>,
    /// Drop sessions idle for longer than this.
    pub idle_ttl: Option<Duration>,
}

impl EvictionPolicy {
    /// Policy that keeps every session forever.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whether this policy can ever evict anything.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_sessions.is_none() && self.idle_ttl.is_none()
    }

    /// Pick the session ids to drop at time `now`.
    ///
    /// `keep` names a session that must survive this pass (the one just
    /// created by the caller).
    pub(crate) fn select_victims(
        &self,
        sessions: &HashMap<String, Session>,
        now: DateTime<Utc>,
        keep: Option<&str>,
    ) -> Vec<String> {
        let evictable = |id: &str, session: &Session| keep != Some(id) && !session.is_busy();

        let mut victims: Vec<String> = match self.idle_ttl {
            Some(ttl) => sessions
                .iter()
                .filter(|(id, s)| evictable(id.as_str(), *s) && s.idle_for(now) > ttl)
                .map(|(id, _)| id.clone())
                .collect(),
            None => Vec::new(),
        };

        if let Some(max) = self.max_sessions {
            let remaining = sessions.len() - victims.len();
            if remaining > max {
                let mut candidates: Vec<(&String, DateTime<Utc>)> = sessions
                    .iter()
                    .filter(|(id, s)| evictable(id.as_str(), *s) && !victims.contains(*id))
                    .map(|(id, s)| (id, s.last_activity()))
                    .collect();
                candidates.sort_by_key(|(_, last)| *last);
                victims.extend(
                    candidates
                        .into_iter()
                        .take(remaining - max)
                        .map(|(id, _)| id.clone()),
                );
            }
        }

        victims
    }
}
