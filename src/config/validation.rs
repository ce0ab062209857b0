//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use std::collections::HashSet;
use crate::utils::errors::{StepperError, Result};
use crate::stepper::{FormDefinition, NavigationLabels};
use super::{Settings, StorageBackend};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_storage_config(&settings.storage)?;
    validate_labels_config(&settings.labels)?;
    validate_logging_config(&settings.logging)?;
    validate_forms(settings)?;

    Ok(())
}

/// Validate bot configuration; only the binary needs a token
pub fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(StepperError::Config(
            "Bot token is required".to_string()
        ));
    }

    Ok(())
}

/// Validate state storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    if config.backend == StorageBackend::Redis && config.redis.url.is_empty() {
        return Err(StepperError::Config(
            "Redis URL is required for the redis storage backend".to_string()
        ));
    }

    Ok(())
}

/// Validate navigation labels
fn validate_labels_config(config: &super::LabelsConfig) -> Result<()> {
    NavigationLabels::from(config).check()
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(StepperError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(StepperError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

/// Validate form definitions: unique names and triggers, buildable entries
fn validate_forms(settings: &Settings) -> Result<()> {
    let labels = NavigationLabels::from(&settings.labels);
    let mut names = HashSet::new();
    let mut triggers = HashSet::new();

    for form in &settings.forms {
        if !names.insert(form.name.as_str()) {
            return Err(StepperError::Config(
                format!("Duplicate form name: {}", form.name)
            ));
        }

        if form.trigger.trim().is_empty() {
            return Err(StepperError::Config(
                format!("Form '{}' has an empty trigger", form.name)
            ));
        }

        if !triggers.insert(form.trigger.as_str()) {
            return Err(StepperError::Config(
                format!("Duplicate form trigger: {}", form.trigger)
            ));
        }

        FormDefinition::from_config(form)?.check(&labels)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntryConfig, FormConfig};
    use crate::stepper::EntryKind;

    fn entry(kind: EntryKind, title: &str) -> EntryConfig {
        EntryConfig {
            kind,
            title: title.to_string(),
            incorrect: format!("Bad {}", title),
            description: None,
            skippable: false,
            options: None,
            base_type: None,
            pattern: None,
        }
    }

    fn form(name: &str, trigger: &str, entries: Vec<EntryConfig>) -> FormConfig {
        FormConfig {
            name: name.to_string(),
            trigger: trigger.to_string(),
            completion_message: Some("Done".to_string()),
            entries,
        }
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_bot_token_required() {
        let settings = Settings::default();
        assert!(validate_bot_config(&settings.bot).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let mut settings = Settings::default();
        settings.storage.backend = StorageBackend::Redis;
        settings.storage.redis.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_identical_skip_and_cancel_rejected() {
        let mut settings = Settings::default();
        settings.labels.cancel = settings.labels.skip.clone();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_main_menu_matching_cancel_rejected() {
        let mut settings = Settings::default();
        settings.labels.main_menu = settings.labels.cancel.clone();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_option_matching_skip_label_rejected() {
        let mut settings = Settings::default();
        let mut role = entry(EntryKind::OneOf, "Role");
        role.options = Some(vec!["Lead".to_string(), "Skip".to_string()]);
        settings.forms = vec![form("profile", "/profile", vec![role])];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_duplicate_form_names_rejected() {
        let mut settings = Settings::default();
        settings.forms = vec![
            form("profile", "/profile", vec![entry(EntryKind::Text, "Name")]),
            form("profile", "/other", vec![entry(EntryKind::Text, "Name")]),
        ];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_form_without_completion_message_rejected() {
        let mut settings = Settings::default();
        let mut profile = form("profile", "/profile", vec![entry(EntryKind::Text, "Name")]);
        profile.completion_message = None;
        settings.forms = vec![profile];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_one_of_without_options_rejected() {
        let mut settings = Settings::default();
        settings.forms = vec![form("profile", "/profile", vec![entry(EntryKind::OneOf, "Role")])];
        assert!(settings.validate().is_err());
    }
}
