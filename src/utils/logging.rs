//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for form progress.

use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::state::ConversationKey;
use crate::utils::errors::{StepperError, Result};

/// Initialize logging based on configuration.
///
/// When a log directory is configured, a daily rolling file is written next to
/// stdout. The returned guard must be kept alive for the file writer to flush.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .map_err(|e| StepperError::config(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match &config.file_path {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "stepper-bot.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| StepperError::config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log a form lifecycle event
pub fn log_form_event(conversation: &ConversationKey, form_id: &str, event: &str, details: Option<&str>) {
    info!(
        chat_id = conversation.chat_id,
        user_id = conversation.user_id,
        form_id = form_id,
        event = event,
        details = details,
        "Form event occurred"
    );
}

/// Log a rejected reply
pub fn log_validation_failure(conversation: &ConversationKey, form_id: &str, entry: &str) {
    debug!(
        chat_id = conversation.chat_id,
        user_id = conversation.user_id,
        form_id = form_id,
        entry = entry,
        "Reply rejected by entry validator"
    );
}

/// Log a reply whose state identifier has no owner
pub fn log_orphaned_reply(conversation: &ConversationKey, identifier: &str) {
    warn!(
        chat_id = conversation.chat_id,
        user_id = conversation.user_id,
        identifier = identifier,
        "Reply belongs to no registered form"
    );
}
