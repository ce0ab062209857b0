//! Services module
//!
//! This module contains the transport-facing services used by forms.

pub mod messaging;

pub use messaging::{Messenger, TelegramMessenger};
