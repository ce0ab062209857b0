//! Reply routing
//!
//! Every incoming reply is matched to a form through the identifier persisted
//! for its conversation. Forms missing from this process (after a restart, or
//! started by another instance sharing the store) are rebuilt from the catalog.

use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::state::{ConversationKey, StateStore};
use crate::stepper::{FormCatalog, FormContext, Reply, ReplyOutcome, Stepper};
use crate::utils::errors::{StepperError, Result};
use crate::utils::logging::log_orphaned_reply;
use super::dispatch::{Continuation, ContinuationRegistry};

/// Where a reply ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The conversation has no persisted identifier
    NoActiveForm,
    /// The persisted identifier belongs to no known form; its state was cleared
    Orphaned,
    Handled(ReplyOutcome),
}

/// Routes replies to the continuation owning the conversation's identifier
#[derive(Debug, Clone)]
pub struct ReplyRouter {
    registry: Arc<ContinuationRegistry>,
    context: FormContext,
    catalog: Option<Arc<FormCatalog>>,
}

impl ReplyRouter {
    pub fn new(registry: Arc<ContinuationRegistry>, context: FormContext) -> Self {
        Self {
            registry,
            context,
            catalog: None,
        }
    }

    /// Restore unknown forms from this catalog instead of dropping their replies
    pub fn with_catalog(mut self, catalog: Arc<FormCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub async fn route(&self, conversation: ConversationKey, reply: &Reply) -> Result<RouteOutcome> {
        let identifier = match self.context.store.get_current_identifier(&conversation).await? {
            Some(identifier) => identifier,
            None => return Ok(RouteOutcome::NoActiveForm),
        };

        // The registry lock is released before the continuation runs
        let continuation = self.registry.lookup(&identifier).await;
        if let Some(continuation) = continuation {
            let outcome = continuation.handle_reply(reply, &identifier).await?;
            if outcome != ReplyOutcome::Unmatched {
                return Ok(RouteOutcome::Handled(outcome));
            }
        } else if let Some(stepper) = self.restore(conversation, &identifier).await? {
            let outcome = stepper.on_reply(reply, &identifier).await?;
            if outcome != ReplyOutcome::Unmatched {
                watch_results(stepper);
                return Ok(RouteOutcome::Handled(outcome));
            }
        }

        log_orphaned_reply(&conversation, &identifier);
        self.context.store.clear(&conversation).await?;
        Ok(RouteOutcome::Orphaned)
    }

    async fn restore(&self, conversation: ConversationKey, identifier: &str) -> Result<Option<Arc<Stepper>>> {
        let catalog = match &self.catalog {
            Some(catalog) => catalog,
            None => return Ok(None),
        };

        let data = self.context.store.get_data(&conversation).await?;
        catalog.restore(identifier, &data, conversation, self.context.clone()).await
    }
}

/// Log the outcome of a restored form once it finishes
fn watch_results(stepper: Arc<Stepper>) {
    tokio::spawn(async move {
        match stepper.get_results().await {
            Ok(results) => {
                info!(form_id = %stepper.id(), form = ?stepper.form_name(), answers = results.len(),
                      "Restored form completed");
            }
            Err(StepperError::Cancelled { form_id }) => {
                debug!(form_id = %form_id, "Restored form cancelled");
            }
            Err(e) => {
                warn!(form_id = %stepper.id(), error = %e, "Restored form finished with an error");
            }
        }
    });
}
