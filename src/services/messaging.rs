//! Outgoing messages
//!
//! Forms talk to users through [`Messenger`]; the Telegram implementation
//! renders quick-reply buttons as a reply keyboard.

use async_trait::async_trait;
use teloxide::{prelude::*, types::{ChatId, KeyboardButton, KeyboardMarkup}};
use tracing::debug;
use crate::state::ConversationKey;
use crate::utils::errors::Result;

/// Delivers prompts, error prompts and completion messages
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` with zero or more quick-reply buttons
    async fn send(&self, conversation: &ConversationKey, text: &str, buttons: &[String]) -> Result<()>;
}

/// Telegram messenger backed by a teloxide bot
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, conversation: &ConversationKey, text: &str, buttons: &[String]) -> Result<()> {
        let chat_id = ChatId(conversation.chat_id);
        let request = self.bot.send_message(chat_id, text);

        match reply_keyboard(buttons) {
            Some(keyboard) => request.reply_markup(keyboard).await?,
            None => request.await?,
        };

        debug!(conversation = %conversation, buttons = buttons.len(), "Message sent");
        Ok(())
    }
}

/// Reply keyboard for the given labels, `None` when there are no buttons
pub fn reply_keyboard(buttons: &[String]) -> Option<KeyboardMarkup> {
    let rows = keyboard_rows(buttons);
    if rows.is_empty() {
        return None;
    }

    let keyboard = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect::<Vec<Vec<KeyboardButton>>>();

    Some(KeyboardMarkup::new(keyboard).resize_keyboard())
}

/// Split labels into keyboard rows of [`buttons_per_row`] each
pub fn keyboard_rows(buttons: &[String]) -> Vec<Vec<String>> {
    if buttons.is_empty() {
        return vec![];
    }

    buttons
        .chunks(buttons_per_row(buttons.len()))
        .map(|row| row.to_vec())
        .collect()
}

/// One button per row up to three, growing by one every three buttons, capped at four
pub fn buttons_per_row(buttons: usize) -> usize {
    if buttons <= 9 {
        buttons.saturating_sub(1) / 3 + 1
    } else {
        4
    }
}
