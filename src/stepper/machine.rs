//! Multi-step form state machine
//!
//! A [`Stepper`] drives one conversation through an ordered list of entries:
//! it prompts for each entry, validates the reply against the awaited entry,
//! persists accepted answers and, after the last entry, publishes the typed
//! results exactly once.
//!
//! All progress lives in the [`StateStore`]. The in-memory position is only a
//! cache recomputed from the persisted identifier on every reply, so a fresh
//! instance built with the same id and entries picks up where another left off.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use uuid::Uuid;
use crate::handlers::dispatch::{Continuation, Dispatch};
use crate::services::Messenger;
use crate::state::{ConversationKey, StateStore};
use crate::utils::errors::{StepperError, Result};
use crate::utils::logging::{log_form_event, log_validation_failure};
use super::entry::{AnswerValue, Entry, Reply};
use super::labels::NavigationLabels;
use super::steps::{step_identifier, StepIdentifiers};

/// Suffix of the data key under which a named form records its name
pub const FORM_NAME_SUFFIX: &str = "#form";

/// Typed answers of a completed form, keyed by entry title
pub type FormResults = HashMap<String, AnswerValue>;

/// Collaborators a stepper talks to
#[derive(Clone)]
pub struct FormContext {
    pub messenger: Arc<dyn Messenger>,
    pub store: Arc<dyn StateStore>,
    pub dispatch: Arc<dyn Dispatch>,
}

impl FormContext {
    pub fn new(messenger: Arc<dyn Messenger>, store: Arc<dyn StateStore>, dispatch: Arc<dyn Dispatch>) -> Self {
        Self { messenger, store, dispatch }
    }
}

impl fmt::Debug for FormContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormContext").finish_non_exhaustive()
    }
}

/// Position of a stepper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    /// Prompt for the entry at this index was sent; waiting for its answer
    AwaitingEntry(usize),
    Complete,
    Cancelled,
}

/// What a reply did to the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The persisted identifier belongs to another form
    Unmatched,
    /// The reply was rejected and the incorrect message sent
    Retry,
    /// The answer was stored and the prompt for `next` sent
    Advanced { next: usize },
    Completed,
    Cancelled,
}

/// Final outcome published to everyone awaiting the results
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Completed(FormResults),
    Cancelled,
}

/// Builder for [`Stepper`]
#[derive(Debug, Clone)]
pub struct StepperBuilder {
    entries: Vec<Entry>,
    completion_message: Option<String>,
    cancel_message: Option<String>,
    labels: NavigationLabels,
    id: Option<String>,
    form_name: Option<String>,
}

impl StepperBuilder {
    /// Create a builder for the given entries with default labels
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            completion_message: None,
            cancel_message: None,
            labels: NavigationLabels::default(),
            id: None,
            form_name: None,
        }
    }

    /// Sent after the last entry is answered; required when there are entries
    pub fn completion_message(mut self, message: impl Into<String>) -> Self {
        self.completion_message = Some(message.into());
        self
    }

    /// Sent when the user presses cancel; nothing is sent when unset
    pub fn cancel_message(mut self, message: impl Into<String>) -> Self {
        self.cancel_message = Some(message.into());
        self
    }

    /// Override the skip / cancel / main-menu labels
    pub fn labels(mut self, labels: NavigationLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Reuse the id of an in-flight form instead of generating one
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Persist the form name so the form can be restored after a restart
    pub fn form_name(mut self, name: impl Into<String>) -> Self {
        self.form_name = Some(name.into());
        self
    }

    /// Validate the form and create a stepper bound to one conversation
    pub fn build(self, conversation: ConversationKey, context: FormContext) -> Result<Arc<Stepper>> {
        validate_form(&self.entries, self.completion_message.as_deref(), &self.labels)?;

        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let steps = StepIdentifiers::new(&id, self.entries.iter().map(Entry::title));
        let (outcome, _) = watch::channel(None);

        debug!(form_id = %id, conversation = %conversation, entries = self.entries.len(), "Stepper created");

        Ok(Arc::new(Stepper {
            id,
            form_name: self.form_name,
            entries: self.entries,
            completion_message: self.completion_message,
            cancel_message: self.cancel_message,
            labels: self.labels,
            steps,
            conversation,
            context,
            state: Mutex::new(StepState::NotStarted),
            outcome,
        }))
    }
}

/// Check a form definition before any message is sent
pub fn validate_form(entries: &[Entry], completion_message: Option<&str>, labels: &NavigationLabels) -> Result<()> {
    if !entries.is_empty() && completion_message.is_none() {
        return Err(StepperError::config("Completion message is required for a form with entries"));
    }

    labels.check()?;

    let mut titles = HashSet::new();
    for entry in entries {
        entry.check()?;
        if !titles.insert(entry.title()) {
            return Err(StepperError::config(format!("Duplicate entry title: {}", entry.title())));
        }

        // Navigation labels are matched before validation, so such an option could never be chosen
        let options = entry.options().unwrap_or_default();
        if let Some(option) = options.iter().find(|option| labels.is_navigation(option)) {
            return Err(StepperError::config(format!(
                "Option '{}' of entry '{}' collides with a navigation label",
                option,
                entry.title()
            )));
        }
    }

    Ok(())
}

/// Drives one conversation through a form
pub struct Stepper {
    id: String,
    form_name: Option<String>,
    entries: Vec<Entry>,
    completion_message: Option<String>,
    cancel_message: Option<String>,
    labels: NavigationLabels,
    steps: StepIdentifiers,
    conversation: ConversationKey,
    context: FormContext,
    /// Held for the whole of start / on_reply, which serializes replies
    state: Mutex<StepState>,
    outcome: watch::Sender<Option<FormOutcome>>,
}

impl Stepper {
    /// Start building a stepper for the given entries
    pub fn builder(entries: Vec<Entry>) -> StepperBuilder {
        StepperBuilder::new(entries)
    }

    /// Instance id prefixing every persisted key of this form
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Catalog name, when the form was built from one
    pub fn form_name(&self) -> Option<&str> {
        self.form_name.as_deref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn labels(&self) -> &NavigationLabels {
        &self.labels
    }

    /// Conversation this form talks to
    pub fn conversation(&self) -> ConversationKey {
        self.conversation
    }

    /// State identifiers of every step, in entry order
    pub fn steps(&self) -> &StepIdentifiers {
        &self.steps
    }

    /// Current position of the form
    pub async fn state(&self) -> StepState {
        *self.state.lock().await
    }

    /// Number of entries answered so far
    pub async fn step_index(&self) -> usize {
        match *self.state.lock().await {
            StepState::NotStarted => 0,
            StepState::AwaitingEntry(index) => index,
            StepState::Complete | StepState::Cancelled => self.entries.len(),
        }
    }

    /// Send the first prompt and register for replies. Calls after the first are no-ops.
    ///
    /// A form still awaiting replies in the same conversation is superseded:
    /// its continuation is released and its waiters observe a cancellation.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != StepState::NotStarted {
            debug!(form_id = %self.id, state = ?*state, "Stepper already started");
            return Ok(());
        }

        self.supersede_previous().await?;

        if self.entries.is_empty() {
            return self.complete(&mut state).await;
        }

        let continuation: Arc<dyn Continuation> = self.clone();
        self.context.dispatch.register_continuation(self.steps.as_slice(), continuation).await;

        if let Some(name) = &self.form_name {
            let key = format!("{}{}", self.id, FORM_NAME_SUFFIX);
            self.context.store.merge_data(&self.conversation, HashMap::from([(key, name.clone())])).await?;
        }

        self.enter(0).await?;
        *state = StepState::AwaitingEntry(0);

        log_form_event(&self.conversation, &self.id, "started", self.form_name.as_deref());
        Ok(())
    }

    /// Handle a reply given the identifier persisted before it arrived
    pub async fn on_reply(&self, reply: &Reply, prior_state: &str) -> Result<ReplyOutcome> {
        let mut state = self.state.lock().await;
        if matches!(*state, StepState::Complete | StepState::Cancelled) {
            return Ok(ReplyOutcome::Unmatched);
        }

        let index = match self.steps.position(prior_state) {
            Some(position) => position - 1,
            None => return Ok(ReplyOutcome::Unmatched),
        };
        *state = StepState::AwaitingEntry(index);
        let entry = &self.entries[index];

        if reply.as_text() == Some(self.labels.cancel.as_str()) {
            self.cancel(&mut state).await?;
            return Ok(ReplyOutcome::Cancelled);
        }

        let raw = match self.accept(entry, reply) {
            Ok(raw) => raw,
            Err(StepperError::Validation { title }) => {
                log_validation_failure(&self.conversation, &self.id, &title);
                self.context.messenger
                    .send(&self.conversation, entry.incorrect(), &entry.buttons(&self.labels))
                    .await?;
                return Ok(ReplyOutcome::Retry);
            }
            Err(e) => return Err(e),
        };

        let key = step_identifier(&self.id, entry.title());
        self.context.store.merge_data(&self.conversation, HashMap::from([(key, raw)])).await?;

        let next = index + 1;
        if next == self.entries.len() {
            self.complete(&mut state).await?;
            return Ok(ReplyOutcome::Completed);
        }

        self.enter(next).await?;
        *state = StepState::AwaitingEntry(next);
        Ok(ReplyOutcome::Advanced { next })
    }

    /// Recompute the position from a persisted identifier.
    ///
    /// Returns the index of the awaited entry, or `None` when the identifier
    /// belongs to another form or this one has finished.
    pub async fn resume(&self, identifier: &str) -> Option<usize> {
        let mut state = self.state.lock().await;
        if matches!(*state, StepState::Complete | StepState::Cancelled) {
            return None;
        }

        let index = self.steps.position(identifier)? - 1;
        *state = StepState::AwaitingEntry(index);
        Some(index)
    }

    /// Resume from a persisted identifier and register for further replies
    pub async fn restore(self: &Arc<Self>, identifier: &str) -> bool {
        if self.resume(identifier).await.is_none() {
            return false;
        }

        let continuation: Arc<dyn Continuation> = self.clone();
        self.context.dispatch.register_continuation(self.steps.as_slice(), continuation).await;
        log_form_event(&self.conversation, &self.id, "restored", Some(identifier));
        true
    }

    /// Send the prompt for the awaited entry again
    pub async fn reprompt(&self) -> Result<()> {
        let state = self.state.lock().await;
        if let StepState::AwaitingEntry(index) = *state {
            self.send_prompt(index).await?;
        }
        Ok(())
    }

    /// Wait until the form finishes. Safe to call before or after completion
    /// and from any number of tasks.
    pub async fn get_results(&self) -> Result<FormResults> {
        let mut receiver = self.outcome.subscribe();
        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| StepperError::Store("completion signal closed".to_string()))?
            .clone();

        match outcome {
            Some(FormOutcome::Completed(results)) => Ok(results),
            _ => Err(StepperError::Cancelled { form_id: self.id.clone() }),
        }
    }

    /// Results if the form has already completed
    pub fn results(&self) -> Option<FormResults> {
        match &*self.outcome.borrow() {
            Some(FormOutcome::Completed(results)) => Some(results.clone()),
            _ => None,
        }
    }

    /// Abort without a message because another form took over the conversation
    pub async fn supersede(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if matches!(*state, StepState::Complete | StepState::Cancelled) {
            return Ok(());
        }

        *state = StepState::Cancelled;
        self.outcome.send_replace(Some(FormOutcome::Cancelled));
        let released = self.release().await;

        log_form_event(&self.conversation, &self.id, "superseded", None);
        released
    }

    /// Finish whatever form owns the conversation's persisted identifier
    async fn supersede_previous(&self) -> Result<()> {
        let previous = match self.context.store.get_current_identifier(&self.conversation).await? {
            Some(identifier) if !self.steps.contains(&identifier) => identifier,
            _ => return Ok(()),
        };

        match self.context.dispatch.continuation_for(&previous).await {
            Some(continuation) => continuation.supersede().await,
            // Owner is not in this process; drop its leftovers
            None => self.context.store.clear(&self.conversation).await,
        }
    }

    /// Raw value to persist, or a validation error for a rejected reply
    fn accept(&self, entry: &Entry, reply: &Reply) -> Result<String> {
        let rejected = || StepperError::Validation { title: entry.title().to_string() };

        if reply.as_text() == Some(self.labels.skip.as_str()) {
            return if entry.is_skippable() {
                Ok(self.labels.skip.clone())
            } else {
                Err(rejected())
            };
        }

        if !entry.validate_answer(reply)? {
            return Err(rejected());
        }

        let raw = entry.raw_value(reply).ok_or_else(rejected)?;

        // Completion coerces every stored value, so an uncoercible one is retried here
        match entry.coerce(&raw) {
            Ok(_) => Ok(raw),
            Err(StepperError::Coercion { .. }) => Err(rejected()),
            Err(e) => Err(e),
        }
    }

    /// Persist the identifier of entry `index`, then prompt for it
    async fn enter(&self, index: usize) -> Result<()> {
        if let Some(identifier) = self.steps.get(index) {
            self.context.store.set_current_identifier(&self.conversation, identifier).await?;
        }
        self.send_prompt(index).await
    }

    async fn send_prompt(&self, index: usize) -> Result<()> {
        let entry = &self.entries[index];
        self.context.messenger
            .send(&self.conversation, &entry.prompt_text(), &entry.buttons(&self.labels))
            .await
    }

    /// Publish results, deliver the completion message and release state.
    /// Every side effect runs even if an earlier one fails.
    async fn complete(&self, state: &mut StepState) -> Result<()> {
        let data = self.context.store.get_data(&self.conversation).await?;
        let results = self.collect_results(&data)?;

        *state = StepState::Complete;
        self.outcome.send_replace(Some(FormOutcome::Completed(results.clone())));

        let sent = match &self.completion_message {
            Some(message) => {
                self.context.messenger
                    .send(&self.conversation, message, std::slice::from_ref(&self.labels.main_menu))
                    .await
            }
            None => Ok(()),
        };
        let released = self.release().await;

        info!(form_id = %self.id, conversation = %self.conversation, answers = results.len(), "Form completed");
        sent?;
        released
    }

    async fn cancel(&self, state: &mut StepState) -> Result<()> {
        *state = StepState::Cancelled;
        self.outcome.send_replace(Some(FormOutcome::Cancelled));

        let sent = match &self.cancel_message {
            Some(message) => {
                self.context.messenger
                    .send(&self.conversation, message, std::slice::from_ref(&self.labels.main_menu))
                    .await
            }
            None => Ok(()),
        };
        let released = self.release().await;

        log_form_event(&self.conversation, &self.id, "cancelled", None);
        sent?;
        released
    }

    async fn release(&self) -> Result<()> {
        self.context.dispatch.release_continuation(self.steps.as_slice()).await;
        self.context.store.clear(&self.conversation).await
    }

    /// Strip this form's id prefix, drop skipped entries and coerce the rest
    fn collect_results(&self, data: &HashMap<String, String>) -> Result<FormResults> {
        let answers: HashMap<String, String> = data
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(self.id.as_str()).map(|title| (title.to_string(), value.clone()))
            })
            .filter(|(_, value)| *value != self.labels.skip)
            .collect();

        let mut results = FormResults::new();
        for entry in &self.entries {
            if !answers.contains_key(entry.title()) {
                continue;
            }
            results.insert(entry.title().to_string(), entry.get_answer(&answers)?);
        }

        Ok(results)
    }
}

#[async_trait]
impl Continuation for Stepper {
    async fn handle_reply(&self, reply: &Reply, prior_state: &str) -> Result<ReplyOutcome> {
        self.on_reply(reply, prior_state).await
    }

    async fn supersede(&self) -> Result<()> {
        Stepper::supersede(self).await
    }
}

impl fmt::Debug for Stepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stepper")
            .field("id", &self.id)
            .field("form_name", &self.form_name)
            .field("entries", &self.entries.len())
            .field("conversation", &self.conversation)
            .finish_non_exhaustive()
    }
}
