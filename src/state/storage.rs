//! State storage implementation
//!
//! This module defines the store contract a form persists its progress through,
//! with an in-process implementation and a Redis-backed one that survives
//! restarts and can be shared between bot processes.

use std::collections::HashMap;
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, error};
use crate::config::RedisConfig;
use crate::utils::errors::Result;
use super::context::{ConversationKey, FieldState};

/// Key/value store holding each conversation's [`FieldState`]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_current_identifier(&self, conversation: &ConversationKey) -> Result<Option<String>>;

    async fn set_current_identifier(&self, conversation: &ConversationKey, identifier: &str) -> Result<()>;

    async fn get_data(&self, conversation: &ConversationKey) -> Result<HashMap<String, String>>;

    async fn merge_data(&self, conversation: &ConversationKey, values: HashMap<String, String>) -> Result<()>;

    async fn clear(&self, conversation: &ConversationKey) -> Result<()>;
}

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<ConversationKey, FieldState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full snapshot of a conversation, if any
    pub async fn snapshot(&self, conversation: &ConversationKey) -> Option<FieldState> {
        self.states.read().await.get(conversation).cloned()
    }

    /// Number of conversations with persisted state
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_current_identifier(&self, conversation: &ConversationKey) -> Result<Option<String>> {
        Ok(self.states.read().await.get(conversation).and_then(|state| state.current.clone()))
    }

    async fn set_current_identifier(&self, conversation: &ConversationKey, identifier: &str) -> Result<()> {
        let mut states = self.states.write().await;
        states.entry(*conversation).or_default().set_current(identifier);
        Ok(())
    }

    async fn get_data(&self, conversation: &ConversationKey) -> Result<HashMap<String, String>> {
        Ok(self.states
            .read()
            .await
            .get(conversation)
            .map(|state| state.data.clone())
            .unwrap_or_default())
    }

    async fn merge_data(&self, conversation: &ConversationKey, values: HashMap<String, String>) -> Result<()> {
        let mut states = self.states.write().await;
        states.entry(*conversation).or_default().merge(values);
        Ok(())
    }

    async fn clear(&self, conversation: &ConversationKey) -> Result<()> {
        self.states.write().await.remove(conversation);
        Ok(())
    }
}

/// Redis-based state store
#[derive(Clone)]
pub struct RedisStateStore {
    /// Redis connection manager
    connection_manager: redis::aio::ConnectionManager,
    /// Redis configuration
    config: RedisConfig,
}

impl RedisStateStore {
    /// Connect to Redis
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    /// Test Redis connection
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn load(&self, conversation: &ConversationKey) -> Result<Option<FieldState>> {
        let key = self.get_state_key(conversation);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;

        match serialized {
            Some(data) => match serde_json::from_str::<FieldState>(&data) {
                Ok(state) => Ok(Some(state)),
                Err(e) => {
                    error!(conversation = %conversation, error = %e, "Failed to deserialize field state");
                    Err(e.into())
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, conversation: &ConversationKey, state: &FieldState) -> Result<()> {
        let key = self.get_state_key(conversation);
        let serialized = serde_json::to_string(state)?;
        let mut conn = self.connection_manager.clone();

        conn.set_ex::<_, _, ()>(&key, serialized, self.config.ttl_seconds).await?;

        debug!(conversation = %conversation, key = %key, current = ?state.current,
               ttl_seconds = self.config.ttl_seconds, "Field state saved to Redis");
        Ok(())
    }

    /// Get the Redis key for a conversation's field state
    fn get_state_key(&self, conversation: &ConversationKey) -> String {
        state_key(&self.config.prefix, conversation)
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get_current_identifier(&self, conversation: &ConversationKey) -> Result<Option<String>> {
        Ok(self.load(conversation).await?.and_then(|state| state.current))
    }

    async fn set_current_identifier(&self, conversation: &ConversationKey, identifier: &str) -> Result<()> {
        let mut state = self.load(conversation).await?.unwrap_or_default();
        state.set_current(identifier);
        self.save(conversation, &state).await
    }

    async fn get_data(&self, conversation: &ConversationKey) -> Result<HashMap<String, String>> {
        Ok(self.load(conversation).await?.map(|state| state.data).unwrap_or_default())
    }

    async fn merge_data(&self, conversation: &ConversationKey, values: HashMap<String, String>) -> Result<()> {
        let mut state = self.load(conversation).await?.unwrap_or_default();
        state.merge(values);
        self.save(conversation, &state).await
    }

    async fn clear(&self, conversation: &ConversationKey) -> Result<()> {
        let key = self.get_state_key(conversation);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        debug!(conversation = %conversation, deleted = deleted > 0, "Field state cleared");

        Ok(())
    }
}

impl std::fmt::Debug for RedisStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStateStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn state_key(prefix: &str, conversation: &ConversationKey) -> String {
    format!("{}form:{}:{}", prefix, conversation.chat_id, conversation.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        let conversation = ConversationKey::private(123);

        assert_eq!(store.get_current_identifier(&conversation).await.unwrap(), None);
        assert!(store.get_data(&conversation).await.unwrap().is_empty());

        store.set_current_identifier(&conversation, "idName").await.unwrap();
        store
            .merge_data(&conversation, HashMap::from([("idName".to_string(), "John".to_string())]))
            .await
            .unwrap();

        assert_eq!(store.get_current_identifier(&conversation).await.unwrap().as_deref(), Some("idName"));
        assert_eq!(store.get_data(&conversation).await.unwrap().get("idName").map(String::as_str), Some("John"));

        store.clear(&conversation).await.unwrap();
        assert!(store.snapshot(&conversation).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_isolates_conversations() {
        let store = MemoryStateStore::new();
        let first = ConversationKey::private(1);
        let second = ConversationKey::private(2);

        store.set_current_identifier(&first, "a").await.unwrap();
        store.set_current_identifier(&second, "b").await.unwrap();
        store.clear(&first).await.unwrap();

        assert_eq!(store.get_current_identifier(&first).await.unwrap(), None);
        assert_eq!(store.get_current_identifier(&second).await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_redis_key_layout() {
        assert_eq!(state_key("stepper:", &ConversationKey::new(-100, 7)), "stepper:form:-100:7");
    }
}
