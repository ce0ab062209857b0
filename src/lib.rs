//! Form Stepper
//!
//! Resumable multi-step forms for chat bots. A form is an ordered list of
//! typed entries; the stepper prompts for each one, validates replies, keeps
//! progress in a pluggable state store and hands back typed results once the
//! last entry is answered.

pub mod config;
pub mod handlers;
pub mod services;
pub mod state;
pub mod stepper;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{StepperError, Result};

// Re-export main components for easy access
pub use handlers::{ContinuationRegistry, ReplyRouter, RouteOutcome};
pub use services::{Messenger, TelegramMessenger};
pub use state::{ConversationKey, MemoryStateStore, RedisStateStore, StateStore};
pub use stepper::{
    AnswerValue, Entry, EntryKind, FormCatalog, FormContext, FormResults, Reply, Stepper,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
