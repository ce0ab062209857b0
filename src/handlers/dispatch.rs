//! Continuation dispatch
//!
//! Forms register a continuation under every state identifier they may
//! persist. When a reply arrives, the identifier recovered from storage selects
//! the continuation that should handle it.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use crate::stepper::{Reply, ReplyOutcome};
use crate::utils::errors::Result;

/// Something that resumes when a reply for one of its identifiers arrives
#[async_trait]
pub trait Continuation: Send + Sync {
    async fn handle_reply(&self, reply: &Reply, prior_state: &str) -> Result<ReplyOutcome>;

    /// Stop awaiting replies because another form took over the conversation
    async fn supersede(&self) -> Result<()>;
}

/// Binds continuations to state identifiers
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn register_continuation(&self, identifiers: &[String], continuation: Arc<dyn Continuation>);

    async fn release_continuation(&self, identifiers: &[String]);

    async fn continuation_for(&self, identifier: &str) -> Option<Arc<dyn Continuation>>;
}

/// In-memory identifier → continuation table
#[derive(Default)]
pub struct ContinuationRegistry {
    continuations: RwLock<HashMap<String, Arc<dyn Continuation>>>,
}

impl ContinuationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuation owning an identifier, if any
    pub async fn lookup(&self, identifier: &str) -> Option<Arc<dyn Continuation>> {
        self.continuations.read().await.get(identifier).cloned()
    }

    /// Number of registered identifiers
    pub async fn len(&self) -> usize {
        self.continuations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.continuations.read().await.is_empty()
    }
}

#[async_trait]
impl Dispatch for ContinuationRegistry {
    async fn register_continuation(&self, identifiers: &[String], continuation: Arc<dyn Continuation>) {
        let mut continuations = self.continuations.write().await;
        for identifier in identifiers {
            continuations.insert(identifier.clone(), continuation.clone());
        }
        debug!(identifiers = identifiers.len(), total = continuations.len(), "Continuation registered");
    }

    async fn release_continuation(&self, identifiers: &[String]) {
        let mut continuations = self.continuations.write().await;
        for identifier in identifiers {
            continuations.remove(identifier);
        }
        debug!(identifiers = identifiers.len(), total = continuations.len(), "Continuation released");
    }

    async fn continuation_for(&self, identifier: &str) -> Option<Arc<dyn Continuation>> {
        self.lookup(identifier).await
    }
}

impl std::fmt::Debug for ContinuationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuationRegistry").finish_non_exhaustive()
    }
}
