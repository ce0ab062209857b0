//! Test helpers
//!
//! A recording messenger and a form context wired to in-memory collaborators.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use form_stepper::{
    handlers::ContinuationRegistry,
    services::Messenger,
    state::{ConversationKey, MemoryStateStore},
    stepper::FormContext,
    Result,
};

/// A message captured by [`RecordingMessenger`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub conversation: ConversationKey,
    pub text: String,
    pub buttons: Vec<String>,
}

/// Messenger that records everything it is asked to send
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|message| message.text).collect()
    }

    pub fn last(&self) -> Option<SentMessage> {
        self.sent().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, conversation: &ConversationKey, text: &str, buttons: &[String]) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            conversation: *conversation,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }
}

/// In-memory collaborators shared by the steppers of one test
pub struct TestContext {
    pub messenger: Arc<RecordingMessenger>,
    pub store: Arc<MemoryStateStore>,
    pub registry: Arc<ContinuationRegistry>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            messenger: Arc::new(RecordingMessenger::default()),
            store: Arc::new(MemoryStateStore::new()),
            registry: Arc::new(ContinuationRegistry::new()),
        }
    }

    /// Context as seen by a stepper
    pub fn form_context(&self) -> FormContext {
        FormContext::new(self.messenger.clone(), self.store.clone(), self.registry.clone())
    }

    /// Same store, fresh messenger and registry, as after a process restart
    pub fn restarted(&self) -> Self {
        Self {
            messenger: Arc::new(RecordingMessenger::default()),
            store: self.store.clone(),
            registry: Arc::new(ContinuationRegistry::new()),
        }
    }
}

pub fn conversation() -> ConversationKey {
    ConversationKey::new(100, 42)
}
