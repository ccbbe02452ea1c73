//! Conversation context.
//!
//! Holds at most one pending [`ClarificationRequest`] per session. A request
//! lives until the next utterance resolves it, a new request supersedes it,
//! it runs out of unanswered turns, or its TTL elapses. Time is taken from
//! the utterance being processed, not the wall clock.

use chrono::{DateTime, Duration, Utc};
use shutter_core::{ClarificationRequest, ConversationConfig};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A clarification request waiting for its follow-up.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingClarification {
    pub request: ClarificationRequest,
    /// Follow-ups so far that neither answered nor superseded the request.
    pub unanswered_turns: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingClarification {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Session-scoped store of pending clarification requests.
pub struct ConversationStore {
    sessions: Arc<RwLock<HashMap<String, PendingClarification>>>,
    ttl: Duration,
    max_unanswered_turns: u32,
}

impl ConversationStore {
    pub fn new(config: &ConversationConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: i64::try_from(config.ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            max_unanswered_turns: config.max_unanswered_turns,
        }
    }

    /// Park a request for `session`, replacing any earlier one.
    pub fn hold(&self, session: &str, request: ClarificationRequest, now: DateTime<Utc>) {
        let pending = PendingClarification {
            request,
            unanswered_turns: 0,
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let previous = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.to_string(), pending);
        if let Some(previous) = previous {
            tracing::info!(
                session = %session,
                request_id = %previous.request.id,
                "Pending clarification superseded"
            );
        }
    }

    /// Remove and return the live request of `session`. Expired requests are
    /// dropped and reported as absent.
    pub fn take(&self, session: &str, now: DateTime<Utc>) -> Option<PendingClarification> {
        let pending = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session)?;
        if pending.is_expired_at(now) {
            tracing::info!(
                session = %session,
                request_id = %pending.request.id,
                "Pending clarification expired"
            );
            return None;
        }
        Some(pending)
    }

    /// Count an unanswered follow-up against a taken request. The request is
    /// kept while it has turns left; returns whether it was kept.
    pub fn defer(&self, session: &str, mut pending: PendingClarification) -> bool {
        pending.unanswered_turns += 1;
        if pending.unanswered_turns >= self.max_unanswered_turns {
            tracing::info!(
                session = %session,
                request_id = %pending.request.id,
                unanswered = pending.unanswered_turns,
                "Pending clarification expired after unanswered turns"
            );
            return false;
        }
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.to_string(), pending);
        true
    }

    /// Pending request of `session`, if any and not expired.
    pub fn peek(&self, session: &str, now: DateTime<Utc>) -> Option<ClarificationRequest> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .filter(|p| !p.is_expired_at(now))
            .map(|p| p.request.clone())
    }

    /// Drop the pending request of `session`. Returns whether one existed.
    pub fn clear(&self, session: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session)
            .is_some()
    }

    /// Drop every expired request. Returns how many were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, p| !p.is_expired_at(now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
