//! Session Checkpoints
//!
//! A session is one conversation thread addressed by a stable key. The
//! control loop saves the conversation under that key after every
//! iteration, so a later turn with the same key resumes the thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::Conversation;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keyed snapshots of conversation state
pub trait SessionCheckpoint: Send + Sync {
    /// Replace the snapshot for a session
    fn save(&self, id: &SessionId, conversation: &Conversation) -> Result<()>;

    /// Latest snapshot, `None` for a session never saved
    fn load(&self, id: &SessionId) -> Result<Option<Conversation>>;

    /// Known sessions, most recently updated first
    fn list(&self) -> Result<Vec<SessionId>>;
}

struct Snapshot {
    conversation: Conversation,
    updated_at: DateTime<Utc>,
}

/// In-memory checkpoint store. Lives as long as the process.
#[derive(Default)]
pub struct MemoryCheckpoint {
    sessions: RwLock<HashMap<SessionId, Snapshot>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::Session("checkpoint lock poisoned".into())
}

impl SessionCheckpoint for MemoryCheckpoint {
    fn save(&self, id: &SessionId, conversation: &Conversation) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(
            id.clone(),
            Snapshot {
                conversation: conversation.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<Conversation>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).map(|s| s.conversation.clone()))
    }

    fn list(&self) -> Result<Vec<SessionId>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut result: Vec<_> = sessions.iter().collect();

        // Sort by updated_at descending
        result.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at));

        Ok(result.into_iter().map(|(id, _)| id.clone()).collect())
    }
}
