//! Conversation field state
//!
//! This module holds the per-conversation snapshot a form reads and writes:
//! the identifier of the step being awaited and the raw answers collected so far.

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one conversation: a user inside a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl ConversationKey {
    pub fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }

    /// Private chats use the user id as chat id
    pub fn private(user_id: i64) -> Self {
        Self::new(user_id, user_id)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

/// Persisted key/value snapshot of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    /// Identifier of the step currently awaited
    pub current: Option<String>,
    /// Raw answers keyed by namespaced entry key
    pub data: HashMap<String, String>,
    /// When this state was last updated
    pub updated_at: DateTime<Utc>,
}

impl FieldState {
    pub fn new() -> Self {
        Self {
            current: None,
            data: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn set_current(&mut self, identifier: &str) {
        self.current = Some(identifier.to_string());
        self.updated_at = Utc::now();
    }

    /// Merge entries into the data map, overwriting existing keys
    pub fn merge(&mut self, values: HashMap<String, String>) {
        self.data.extend(values);
        self.updated_at = Utc::now();
    }

    /// True when nothing has been persisted
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.data.is_empty()
    }
}

impl Default for FieldState {
    fn default() -> Self {
        Self::new()
    }
}
