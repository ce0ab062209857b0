//! Error handling for the form stepper
//!
//! This module defines the main error type used throughout the crate
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for form stepper operations
#[derive(Error, Debug)]
pub enum StepperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Reply rejected by the awaiting entry. Absorbed by the stepper, which
    /// answers with the entry's incorrect message instead.
    #[error("Validation failed for entry '{title}'")]
    Validation { title: String },

    #[error("Form {form_id} was cancelled")]
    Cancelled { form_id: String },

    #[error("Cannot coerce value of entry '{title}': {reason}")]
    Coercion { title: String, reason: String },

    #[error("State store error: {0}")]
    Store(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for form stepper operations
pub type Result<T> = std::result::Result<T, StepperError>;

impl StepperError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        StepperError::Config(message.into())
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            StepperError::Config(_) => false,
            StepperError::ConfigLoad(_) => false,
            StepperError::Validation { .. } => true,
            StepperError::Cancelled { .. } => false,
            StepperError::Coercion { .. } => false,
            StepperError::Store(_) => true,
            StepperError::Redis(_) => true,
            StepperError::Telegram(_) => true,
            StepperError::Serialization(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StepperError::Config(_) => ErrorSeverity::Critical,
            StepperError::ConfigLoad(_) => ErrorSeverity::Critical,
            StepperError::Coercion { .. } => ErrorSeverity::Critical,
            StepperError::Validation { .. } => ErrorSeverity::Info,
            StepperError::Cancelled { .. } => ErrorSeverity::Info,
            StepperError::Telegram(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        let error = StepperError::config("Completion message is required");
        assert!(!error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.to_string(), "Configuration error: Completion message is required");
    }

    #[test]
    fn test_validation_errors_are_recoverable() {
        let error = StepperError::Validation { title: "Age".to_string() };
        assert!(error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Info);
        assert_eq!(error.severity().to_string(), "INFO");
    }

    #[test]
    fn test_coercion_errors_are_critical() {
        let error = StepperError::Coercion { title: "Count".to_string(), reason: "not an integer".to_string() };
        assert!(!error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.to_string(), "Cannot coerce value of entry 'Count': not an integer");
    }
}
