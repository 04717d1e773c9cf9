//! Session Store (C4)
//!
//! A per-session rolling window of turns plus session-scoped metadata.
//! Process-local only, per spec.md §9's accepted limitation: sessions are
//! not persisted across restarts and do not survive horizontal scaling.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::planner::Decision;

pub const DEFAULT_WINDOW: usize = 3;
pub const DEFAULT_TTL_MINUTES: i64 = 60;
pub const DEFAULT_SOFT_CAP: usize = 10_000;

/// Recognized metadata keys, per spec.md §3.
pub const META_LAST_PRIMARY_ACTION: &str = "last_primary_action";
pub const META_LAST_PRODUCT_QUERY: &str = "last_product_query";
pub const META_LAST_OUTLET_QUERY: &str = "last_outlet_query";
pub const META_PREFERRED_SORT: &str = "preferred_sort";

/// One user/assistant exchange plus the decision that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub user_utterance: String,
    pub assistant_utterance: String,
    pub decision: Decision,
    pub timestamp: DateTime<Utc>,
}

/// A conversation's state. Append-only turn history, bounded to `window`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self { id, turns: Vec::new(), metadata: HashMap::new(), created_at: now, last_activity: now }
    }
}

/// Read-only view returned by `snapshot`; the Planner consults this without
/// holding a reference into the live, mutable Session (spec.md §9).
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: String,
    pub turns: Vec<Turn>,
    pub metadata: HashMap<String, String>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self { id: session.id.clone(), turns: session.turns.clone(), metadata: session.metadata.clone() }
    }
}

/// Per-session-locked, process-local session store.
pub struct SessionStore {
    sessions: Arc<DashMap<String, Arc<Mutex<Session>>>>,
    window: usize,
    ttl_minutes: i64,
    soft_cap: usize,
}

impl SessionStore {
    pub fn new(window: usize, ttl_minutes: i64) -> Self {
        Self { sessions: Arc::new(DashMap::new()), window, ttl_minutes, soft_cap: DEFAULT_SOFT_CAP }
    }

    /// Generate a fresh opaque session id.
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Fetch a session by id, creating it if absent.
    pub async fn get_or_create(&self, session_id: &str) -> SessionSnapshot {
        let entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id.to_string()))))
            .clone();
        let session = entry.lock().await;
        SessionSnapshot::from(&*session)
    }

    /// Append a turn, applying the windowing invariant: after append, the
    /// turn count never exceeds `window`.
    pub async fn append_turn(&self, session_id: &str, turn: Turn) {
        let entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id.to_string()))))
            .clone();
        let mut session = entry.lock().await;
        session.turns.push(turn);
        while session.turns.len() > self.window {
            session.turns.remove(0);
        }
        session.last_activity = Utc::now();
    }

    /// Atomically overwrite a metadata key.
    pub async fn update_metadata(&self, session_id: &str, key: &str, value: impl Into<String>) {
        let entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id.to_string()))))
            .clone();
        let mut session = entry.lock().await;
        session.metadata.insert(key.to_string(), value.into());
        session.last_activity = Utc::now();
    }

    /// A read-only view of a session if it exists.
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        let entry = self.sessions.get(session_id)?.clone();
        let session = entry.lock().await;
        Some(SessionSnapshot::from(&*session))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict sessions inactive for more than `ttl_minutes`, then, if still
    /// over the soft cap, evict the least-recently-active until under it.
    pub async fn evict_expired(&self, now: DateTime<Utc>) {
        let ttl = chrono::Duration::minutes(self.ttl_minutes);
        let mut expired = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value().lock().await;
            if now.signed_duration_since(session.last_activity) > ttl {
                expired.push(entry.key().clone());
            }
        }
        for id in expired {
            self.sessions.remove(&id);
        }

        if self.sessions.len() <= self.soft_cap {
            return;
        }

        let mut by_activity: Vec<(String, DateTime<Utc>)> = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value().lock().await;
            by_activity.push((entry.key().clone(), session.last_activity));
        }
        by_activity.sort_by_key(|(_, last_activity)| *last_activity);

        let overflow = self.sessions.len().saturating_sub(self.soft_cap);
        for (id, _) in by_activity.into_iter().take(overflow) {
            self.sessions.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Decision, PrimaryAction};

    fn sample_decision() -> Decision {
        Decision {
            primary_action: PrimaryAction::AnswerDirectly,
            confidence: 0.5,
            reasoning: "test".to_string(),
            has_numbers: false,
            has_operators: false,
            has_math_expression: false,
            product_keywords_hit: false,
            outlet_keywords_hit: false,
            location_mentioned: false,
            missing_info: Vec::new(),
            plan: Vec::new(),
            clarification_prompt: None,
        }
    }

    fn sample_turn(user: &str) -> Turn {
        Turn {
            user_utterance: user.to_string(),
            assistant_utterance: "ack".to_string(),
            decision: sample_decision(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new(DEFAULT_WINDOW, DEFAULT_TTL_MINUTES);
        let a = store.get_or_create("s1").await;
        let b = store.get_or_create("s1").await;
        assert_eq!(a.id, b.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_window_never_exceeded() {
        let store = SessionStore::new(2, DEFAULT_TTL_MINUTES);
        for i in 0..5 {
            store.append_turn("s1", sample_turn(&format!("turn {}", i))).await;
        }
        let snapshot = store.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns.last().unwrap().user_utterance, "turn 4");
    }

    #[tokio::test]
    async fn test_window_zero_carries_no_turns() {
        let store = SessionStore::new(0, DEFAULT_TTL_MINUTES);
        store.append_turn("s1", sample_turn("hello")).await;
        let snapshot = store.snapshot("s1").await.unwrap();
        assert!(snapshot.turns.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_overwrite() {
        let store = SessionStore::new(DEFAULT_WINDOW, DEFAULT_TTL_MINUTES);
        store.update_metadata("s1", META_LAST_PRIMARY_ACTION, "search_products").await;
        store.update_metadata("s1", META_LAST_PRIMARY_ACTION, "calculate").await;
        let snapshot = store.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.metadata.get(META_LAST_PRIMARY_ACTION).unwrap(), "calculate");
    }

    #[tokio::test]
    async fn test_snapshot_missing_session_is_none() {
        let store = SessionStore::new(DEFAULT_WINDOW, DEFAULT_TTL_MINUTES);
        assert!(store.snapshot("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_evict_expired_removes_stale_sessions() {
        let store = SessionStore::new(DEFAULT_WINDOW, 1);
        store.append_turn("old", sample_turn("hi")).await;
        {
            let entry = store.sessions.get("old").unwrap().clone();
            let mut session = entry.lock().await;
            session.last_activity = Utc::now() - chrono::Duration::minutes(10);
        }
        store.append_turn("fresh", sample_turn("hi")).await;

        store.evict_expired(Utc::now()).await;

        assert!(store.snapshot("old").await.is_none());
        assert!(store.snapshot("fresh").await.is_some());
    }
}
