//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use crate::stepper::{BaseType, EntryKind};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub forms: Vec<FormConfig>,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
}

/// Which backend keeps conversation state between replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

/// State storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Navigation button labels shared by every form
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub skip: String,
    pub cancel: String,
    pub main_menu: String,
    /// Sent when a user aborts a form; nothing is sent when unset
    pub cancel_message: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily rolling log files; stdout only when unset
    pub file_path: Option<String>,
    #[serde(default)]
    pub json: bool,
}

/// A form declared in configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormConfig {
    pub name: String,
    /// Message text that starts the form, e.g. "/register"
    pub trigger: String,
    pub completion_message: Option<String>,
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

/// A single entry of a configured form
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntryConfig {
    pub kind: EntryKind,
    pub title: String,
    pub incorrect: String,
    pub description: Option<String>,
    #[serde(default)]
    pub skippable: bool,
    pub options: Option<Vec<String>>,
    /// Overrides the kind's default result type
    pub base_type: Option<BaseType>,
    /// Regex a text answer must match
    pub pattern: Option<String>,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::from_file("config")
    }

    /// Load settings from the given file (extension optional) and environment variables
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("STEPPER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::StepperError> {
        super::validation::validate_settings(self)
    }

    /// Look up a configured form by name
    pub fn form(&self, name: &str) -> Option<&FormConfig> {
        self.forms.iter().find(|form| form.name == name)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            storage: StorageConfig::default(),
            labels: LabelsConfig::default(),
            logging: LoggingConfig::default(),
            forms: vec![],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            redis: RedisConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "stepper:".to_string(),
            ttl_seconds: 86400,
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            skip: "Skip".to_string(),
            cancel: "Cancel".to_string(),
            main_menu: "Main Menu".to_string(),
            cancel_message: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.labels.skip, "Skip");
        assert_eq!(settings.labels.cancel, "Cancel");
        assert_eq!(settings.labels.main_menu, "Main Menu");
        assert!(settings.forms.is_empty());
    }

    #[test]
    fn test_load_forms_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[bot]
token = "12345:test_token"

[labels]
skip = "Пропустить"
cancel = "Отмена"
main_menu = "Меню"

[[forms]]
name = "registration"
trigger = "/register"
completion_message = "Thanks!"

[[forms.entries]]
kind = "text"
title = "Name"
incorrect = "Please enter your name"

[[forms.entries]]
kind = "number"
title = "Age"
incorrect = "Please enter a valid age"
skippable = true

[[forms.entries]]
kind = "one_of"
title = "Role"
incorrect = "Pick a role"
options = ["Leader", "Follower"]
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = Settings::from_file(&path).unwrap();

        assert_eq!(settings.bot.token, "12345:test_token");
        assert_eq!(settings.labels.skip, "Пропустить");

        let form = settings.form("registration").unwrap();
        assert_eq!(form.trigger, "/register");
        assert_eq!(form.entries.len(), 3);
        assert_eq!(form.entries[1].kind, EntryKind::Number);
        assert!(form.entries[1].skippable);
        assert_eq!(form.entries[2].options.as_deref(), Some(&["Leader".to_string(), "Follower".to_string()][..]));
        assert!(settings.form("missing").is_none());
    }
}
