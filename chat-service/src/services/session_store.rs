//! In-memory session storage with lazy and periodic expiry.

use crate::error::ChatError;
use crate::models::response::StrategyUsed;
use crate::models::session::{Feedback, InteractionMetadata, Session};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default idle timeout before a session is evicted.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

/// Maps session identifiers to live sessions.
///
/// Lookups hand out snapshots (clones); mutations re-lock by id. Two
/// concurrent requests against the same session id may interleave their
/// context updates; no cross-request isolation is provided.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Create a new empty session and return its identifier.
    pub async fn create(&self) -> String {
        let (session_id, _) = self.insert_new().await;
        session_id
    }

    /// Look up a session snapshot. An expired session is evicted and reported
    /// as absent.
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        live_session(&mut sessions, session_id, self.timeout).map(|s| s.clone())
    }

    /// Resolve the supplied id, or mint a fresh session when the id is
    /// missing, unknown, or expired. Never fails.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> (String, Session) {
        if let Some(id) = session_id {
            if let Some(session) = self.get(id).await {
                return (id.to_string(), session);
            }
        }
        self.insert_new().await
    }

    /// Remove every session whose idle time exceeds the timeout.
    pub async fn sweep(&self) {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Swept expired sessions");
        }
    }

    /// Append an interaction to a session and recompute its context. Dropped
    /// with a warning if the session vanished (expired mid-request).
    pub async fn add_interaction(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        strategy: StrategyUsed,
        metadata: InteractionMetadata,
    ) {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(session) => session.add_interaction(question, answer, strategy, metadata),
            None => {
                tracing::warn!(session_id, "Dropping interaction for unknown session");
            }
        }
    }

    /// Attach feedback to a recorded interaction, addressed by index.
    pub async fn record_feedback(
        &self,
        session_id: &str,
        interaction_index: usize,
        rating: u8,
        comment: Option<String>,
    ) -> Result<(), ChatError> {
        let mut sessions = self.sessions.lock().await;
        let session = live_session(&mut sessions, session_id, self.timeout)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let len = session.history.len();
        let interaction = session.history.get_mut(interaction_index).ok_or(
            ChatError::InvalidFeedbackIndex {
                index: interaction_index,
                len,
            },
        )?;

        interaction.metadata.feedback = Some(Feedback {
            rating,
            comment,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Manually terminate a session.
    pub async fn end_session(&self, session_id: &str) -> Result<(), ChatError> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    /// Number of currently live sessions, without evicting expired ones.
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn insert_new(&self) -> (String, Session) {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone());
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session_id.clone(), session.clone());
        tracing::debug!(session_id = %session_id, "Created new conversation session");
        (session_id, session)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TIMEOUT_MINUTES))
    }
}

/// Expiry-aware mutable lookup: evicts and reports absent when the session is
/// past its idle timeout.
fn live_session<'a>(
    sessions: &'a mut HashMap<String, Session>,
    session_id: &str,
    timeout: Duration,
) -> Option<&'a mut Session> {
    if sessions
        .get(session_id)
        .is_some_and(|s| s.is_expired(timeout))
    {
        sessions.remove(session_id);
        tracing::debug!(session_id, "Evicted expired session on lookup");
        return None;
    }
    sessions.get_mut(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let store = SessionStore::default();
        let id = store.create().await;
        let session = store.get(&id).await.expect("session should exist");
        assert_eq!(session.session_id, id);
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_absent() {
        let store = SessionStore::default();
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_evicted_on_lookup() {
        let store = SessionStore::new(Duration::milliseconds(20));
        let id = store.create().await;
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(store.get(&id).await.is_none());
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_sessions() {
        let store = SessionStore::new(Duration::milliseconds(20));
        store.create().await;
        store.create().await;
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        store.sweep().await;
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_or_create_replaces_invalid_id() {
        let store = SessionStore::default();
        let (id, session) = store.get_or_create(Some("bogus")).await;
        assert_ne!(id, "bogus");
        assert!(session.history.is_empty());

        let (same_id, _) = store.get_or_create(Some(&id)).await;
        assert_eq!(same_id, id);
    }

    #[tokio::test]
    async fn test_add_interaction_is_append_only() {
        let store = SessionStore::default();
        let id = store.create().await;

        for i in 0..3 {
            store
                .add_interaction(
                    &id,
                    &format!("question {}", i),
                    "answer",
                    StrategyUsed::Rag,
                    InteractionMetadata::default(),
                )
                .await;
            let session = store.get(&id).await.unwrap();
            assert_eq!(session.history.len(), i + 1);
        }

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.history[0].question, "question 0");
        assert_eq!(session.history[2].question, "question 2");
    }

    #[tokio::test]
    async fn test_feedback_attaches_to_interaction() {
        let store = SessionStore::default();
        let id = store.create().await;
        store
            .add_interaction(
                &id,
                "How many products?",
                "77",
                StrategyUsed::Sql,
                InteractionMetadata::default(),
            )
            .await;

        store
            .record_feedback(&id, 0, 5, Some("great".to_string()))
            .await
            .expect("feedback should be recorded");

        let session = store.get(&id).await.unwrap();
        let feedback = session.history[0].metadata.feedback.as_ref().unwrap();
        assert_eq!(feedback.rating, 5);
        assert_eq!(feedback.comment.as_deref(), Some("great"));
    }

    #[tokio::test]
    async fn test_feedback_with_invalid_index_is_rejected() {
        let store = SessionStore::default();
        let id = store.create().await;

        let err = store.record_feedback(&id, 3, 4, None).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::InvalidFeedbackIndex { index: 3, len: 0 }
        ));

        let session = store.get(&id).await.unwrap();
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_for_unknown_session_is_rejected() {
        let store = SessionStore::default();
        let err = store.record_feedback("nope", 0, 4, None).await.unwrap_err();
        assert!(matches!(err, ChatError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_end_session() {
        let store = SessionStore::default();
        let id = store.create().await;
        store.end_session(&id).await.expect("session should end");
        assert!(store.get(&id).await.is_none());
        assert!(matches!(
            store.end_session(&id).await,
            Err(ChatError::SessionNotFound(_))
        ));
    }
}
