//! State management module
//!
//! This module handles conversation state persisted between replies

pub mod context;
pub mod storage;

// Re-export commonly used state components
pub use context::{ConversationKey, FieldState};
pub use storage::{StateStore, MemoryStateStore, RedisStateStore};
