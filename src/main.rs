//! Form Stepper demo bot
//!
//! Main application entry point. Starts the forms declared in configuration
//! when their trigger is sent and routes every other message to the form
//! awaiting it.

use std::sync::Arc;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use tracing::{debug, error, info, warn};

use form_stepper::{
    config::{validation::validate_bot_config, Settings, StorageBackend},
    handlers::{ContinuationRegistry, ReplyRouter, RouteOutcome},
    services::{Messenger, TelegramMessenger},
    state::{ConversationKey, MemoryStateStore, RedisStateStore, StateStore},
    stepper::{FormCatalog, FormContext, Reply, Stepper},
    utils::{errors::StepperError, logging},
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;
    validate_bot_config(&settings.bot)?;

    // Initialize logging; the guard flushes the log file on shutdown
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", form_stepper::info());

    let store: Arc<dyn StateStore> = match settings.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory state store");
            Arc::new(MemoryStateStore::new())
        }
        StorageBackend::Redis => {
            info!("Connecting to Redis...");
            let store = RedisStateStore::new(settings.storage.redis.clone()).await?;
            store.test_connection().await?;
            Arc::new(store)
        }
    };

    let bot = Bot::new(&settings.bot.token);
    let registry = Arc::new(ContinuationRegistry::new());
    let context = FormContext::new(Arc::new(TelegramMessenger::new(bot.clone())), store, registry.clone());

    let catalog = Arc::new(FormCatalog::from_settings(&settings)?);
    let router = Arc::new(ReplyRouter::new(registry, context.clone()).with_catalog(catalog.clone()));

    info!(forms = settings.forms.len(), "Forms loaded");

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![catalog, router, context])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .enable_ctrlc_handler()
        .build();

    info!("Starting bot with polling mode...");
    dispatcher.dispatch().await;
    info!("Bot has been shut down.");

    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    Update::filter_message().endpoint(handle_message)
}

/// Start a form on its trigger, otherwise hand the message to the router
async fn handle_message(
    msg: Message,
    catalog: Arc<FormCatalog>,
    router: Arc<ReplyRouter>,
    context: FormContext,
) -> HandlerResult {
    let user_id = msg.from.as_ref().map(|user| user.id.0 as i64).unwrap_or(msg.chat.id.0);
    let conversation = ConversationKey::new(msg.chat.id.0, user_id);

    if let Some(form) = msg.text().and_then(|text| catalog.by_trigger(text)) {
        let stepper = catalog.build(&form.name, conversation, context.clone())?;
        stepper.start().await?;
        send_summary_when_done(stepper, context);
        return Ok(());
    }

    let reply = match message_reply(&msg) {
        Some(reply) => reply,
        None => {
            debug!(conversation = %conversation, "Message has no text or file");
            return Ok(());
        }
    };

    match router.route(conversation, &reply).await {
        Ok(RouteOutcome::NoActiveForm) => {
            debug!(conversation = %conversation, "Message outside of any form");
        }
        Ok(outcome) => {
            debug!(conversation = %conversation, outcome = ?outcome, "Reply routed");
        }
        Err(e) => {
            error!(conversation = %conversation, error = %e, severity = %e.severity(), "Error handling reply");
            if !e.is_recoverable() {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Text, or the id of an uploaded document or photo
fn message_reply(msg: &Message) -> Option<Reply> {
    if let Some(text) = msg.text() {
        return Some(Reply::text(text));
    }
    if let Some(document) = msg.document() {
        return Some(Reply::file(document.file.id.to_string()));
    }
    msg.photo()
        .and_then(|sizes| sizes.last())
        .map(|photo| Reply::file(photo.file.id.to_string()))
}

/// Echo the collected answers back once the form completes
fn send_summary_when_done(stepper: Arc<Stepper>, context: FormContext) {
    tokio::spawn(async move {
        let results = match stepper.get_results().await {
            Ok(results) => results,
            Err(StepperError::Cancelled { form_id }) => {
                debug!(form_id = %form_id, "Form cancelled");
                return;
            }
            Err(e) => {
                warn!(form_id = %stepper.id(), error = %e, "Form finished with an error");
                return;
            }
        };

        let summary = stepper
            .entries()
            .iter()
            .filter_map(|entry| results.get(entry.title()).map(|value| format!("{}: {}", entry.title(), value)))
            .collect::<Vec<_>>()
            .join("\n");

        if summary.is_empty() {
            return;
        }

        let conversation = stepper.conversation();
        if let Err(e) = context.messenger.send(&conversation, &summary, &[]).await {
            error!(conversation = %conversation, error = %e, "Failed to send form summary");
        }
    });
}
