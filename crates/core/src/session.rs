//! Session State and Storage
//!
//! A `Session` holds the conversation history and personality for exactly one
//! live client connection. The `SessionStore` owns every live session, keyed
//! by its identifier, and is shared by all connections of the server process.

use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// System prompt used until a client sets its own personality.
pub const DEFAULT_PERSONALITY: &str = "You are a helpful, friendly, and intelligent AI assistant.";

/// The author of a single turn in the conversation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// One message exchanged within a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Server-side state for one client connection.
///
/// The history can only grow by whole user/model exchanges, so it always
/// alternates strictly, starting with a user turn.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    history: Vec<Turn>,
    personality: String,
}

impl Session {
    /// Creates an empty session with the given personality.
    pub fn new(id: Uuid, personality: impl Into<String>) -> Self {
        Self {
            id,
            history: Vec::new(),
            personality: personality.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The conversation so far, oldest turn first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The system prompt currently steering this session.
    pub fn personality(&self) -> &str {
        &self.personality
    }

    /// Appends a completed exchange: the user's message followed by the reply.
    pub fn record_exchange(&mut self, user_text: impl Into<String>, reply: impl Into<String>) {
        self.history.push(Turn::user(user_text));
        self.history.push(Turn::model(reply));
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Replaces the personality. The history is cleared along with it, since
    /// earlier turns were produced under a different system prompt.
    pub fn set_personality(&mut self, personality: impl Into<String>) {
        self.personality = personality.into();
        self.history.clear();
    }
}

/// A shared reference to one live session.
///
/// Cloning the handle is cheap. The session itself sits behind an async mutex
/// so the connection's relay worker can hold it across gateway calls.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }
}

/// In-memory store of all live sessions.
///
/// Backed by a sharded concurrent map: lookups for different sessions never
/// contend on a shared lock.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, SessionHandle>>,
    default_personality: Arc<str>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONALITY)
    }
}

impl SessionStore {
    /// Creates an empty store whose new sessions start with `default_personality`.
    pub fn new(default_personality: impl Into<String>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            default_personality: Arc::from(default_personality.into()),
        }
    }

    /// Creates and registers a new session with a fresh identifier.
    pub fn create(&self) -> SessionHandle {
        loop {
            let id = Uuid::new_v4();
            match self.sessions.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let handle = SessionHandle {
                        id,
                        inner: Arc::new(Mutex::new(Session::new(
                            id,
                            self.default_personality.as_ref(),
                        ))),
                    };
                    slot.insert(handle.clone());
                    return handle;
                }
            }
        }
    }

    /// Looks up a live session.
    pub fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Removes a session. Returns `false` if it was already gone.
    pub fn destroy(&self, id: Uuid) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn default_personality(&self) -> &str {
        &self.default_personality
    }
}
