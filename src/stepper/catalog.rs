//! Named form definitions
//!
//! The catalog builds steppers for forms declared in configuration and
//! rebuilds in-flight ones from persisted state, which lets any process
//! continue a form another process started.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::config::{FormConfig, Settings};
use crate::state::ConversationKey;
use crate::utils::errors::{StepperError, Result};
use super::entry::Entry;
use super::labels::NavigationLabels;
use super::machine::{validate_form, FormContext, Stepper, StepperBuilder, FORM_NAME_SUFFIX};

/// A reusable form: entries plus completion message
#[derive(Debug, Clone)]
pub struct FormDefinition {
    pub name: String,
    pub trigger: Option<String>,
    pub entries: Vec<Entry>,
    pub completion_message: Option<String>,
}

impl FormDefinition {
    pub fn new(name: impl Into<String>, entries: Vec<Entry>, completion_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger: None,
            entries,
            completion_message: Some(completion_message.into()),
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Build a definition from its configuration section
    pub fn from_config(config: &FormConfig) -> Result<Self> {
        let mut entries = Vec::with_capacity(config.entries.len());

        for entry_config in &config.entries {
            let mut entry = Entry::new(entry_config.kind, &entry_config.title, &entry_config.incorrect)
                .skippable(entry_config.skippable);

            if let Some(description) = &entry_config.description {
                entry = entry.with_description(description);
            }
            if let Some(options) = &entry_config.options {
                entry = entry.with_options(options.iter().cloned());
            }
            if let Some(base_type) = entry_config.base_type {
                entry = entry.with_base_type(base_type);
            }
            if let Some(pattern) = &entry_config.pattern {
                entry = entry.with_pattern(pattern)?;
            }

            entries.push(entry);
        }

        Ok(Self {
            name: config.name.clone(),
            trigger: Some(config.trigger.clone()),
            entries,
            completion_message: config.completion_message.clone(),
        })
    }

    /// Same checks a stepper runs at construction
    pub fn check(&self, labels: &NavigationLabels) -> Result<()> {
        validate_form(&self.entries, self.completion_message.as_deref(), labels)
            .map_err(|e| StepperError::config(format!("Form '{}': {}", self.name, e)))
    }

    fn builder(&self) -> StepperBuilder {
        let builder = Stepper::builder(self.entries.clone()).form_name(&self.name);
        match &self.completion_message {
            Some(message) => builder.completion_message(message),
            None => builder,
        }
    }
}

/// Registry of form definitions sharing one set of navigation labels
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: HashMap<String, FormDefinition>,
    labels: NavigationLabels,
    cancel_message: Option<String>,
}

impl FormCatalog {
    pub fn new(labels: NavigationLabels) -> Self {
        Self {
            forms: HashMap::new(),
            labels,
            cancel_message: None,
        }
    }

    /// Catalog of every form declared in the settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut catalog = Self::new(NavigationLabels::from(&settings.labels));
        catalog.cancel_message = settings.labels.cancel_message.clone();

        for form in &settings.forms {
            catalog.register(FormDefinition::from_config(form)?)?;
        }

        Ok(catalog)
    }

    pub fn with_cancel_message(mut self, message: impl Into<String>) -> Self {
        self.cancel_message = Some(message.into());
        self
    }

    pub fn register(&mut self, definition: FormDefinition) -> Result<()> {
        definition.check(&self.labels)?;
        if self.forms.contains_key(&definition.name) {
            return Err(StepperError::config(format!("Duplicate form name: {}", definition.name)));
        }
        self.forms.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FormDefinition> {
        self.forms.get(name)
    }

    /// Form started by the given message text
    pub fn by_trigger(&self, text: &str) -> Option<&FormDefinition> {
        self.forms.values().find(|form| form.trigger.as_deref() == Some(text))
    }

    pub fn labels(&self) -> &NavigationLabels {
        &self.labels
    }

    /// Build a fresh stepper for a named form
    pub fn build(&self, name: &str, conversation: ConversationKey, context: FormContext) -> Result<Arc<Stepper>> {
        let definition = self.get(name)
            .ok_or_else(|| StepperError::config(format!("Unknown form: {}", name)))?;

        self.configure(definition.builder()).build(conversation, context)
    }

    /// Rebuild the stepper owning `identifier` from the conversation's persisted data.
    ///
    /// The restored stepper is positioned at the awaited entry and registered
    /// for replies. Returns `None` when no named form owns the identifier.
    pub async fn restore(
        &self,
        identifier: &str,
        data: &HashMap<String, String>,
        conversation: ConversationKey,
        context: FormContext,
    ) -> Result<Option<Arc<Stepper>>> {
        for (key, name) in data {
            let id = match key.strip_suffix(FORM_NAME_SUFFIX) {
                Some(id) if identifier.starts_with(id) => id,
                _ => continue,
            };

            let definition = match self.get(name) {
                Some(definition) => definition,
                None => {
                    warn!(form = %name, form_id = %id, "Persisted form is not in the catalog");
                    continue;
                }
            };

            let stepper = self.configure(definition.builder().id(id)).build(conversation, context.clone())?;
            if stepper.restore(identifier).await {
                debug!(form = %name, form_id = %id, conversation = %conversation, "Form restored from storage");
                return Ok(Some(stepper));
            }
        }

        Ok(None)
    }

    fn configure(&self, builder: StepperBuilder) -> StepperBuilder {
        let builder = builder.labels(self.labels.clone());
        match &self.cancel_message {
            Some(message) => builder.cancel_message(message),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntryConfig, FormConfig};
    use crate::stepper::{BaseType, EntryKind};

    fn registration() -> FormDefinition {
        FormDefinition::new(
            "registration",
            vec![Entry::text("Name", "bad name"), Entry::number("Age", "bad age")],
            "Thanks!",
        )
        .with_trigger("/register")
    }

    #[test]
    fn test_register_and_lookup() {
        let mut catalog = FormCatalog::default();
        catalog.register(registration()).unwrap();

        assert!(catalog.get("registration").is_some());
        assert_eq!(catalog.by_trigger("/register").map(|form| form.name.as_str()), Some("registration"));
        assert!(catalog.by_trigger("/other").is_none());
        assert!(catalog.register(registration()).is_err());
    }

    #[test]
    fn test_register_rejects_invalid_definition() {
        let mut catalog = FormCatalog::default();
        let mut definition = registration();
        definition.completion_message = None;
        assert!(catalog.register(definition).is_err());
    }

    #[test]
    fn test_definition_from_config() {
        let config = FormConfig {
            name: "profile".to_string(),
            trigger: "/profile".to_string(),
            completion_message: Some("Saved".to_string()),
            entries: vec![EntryConfig {
                kind: EntryKind::Text,
                title: "Height".to_string(),
                incorrect: "Digits please".to_string(),
                description: Some("In centimetres".to_string()),
                skippable: true,
                options: Some(vec!["170".to_string(), "180".to_string()]),
                base_type: Some(BaseType::Integer),
                pattern: Some(r"^\d{2,3}$".to_string()),
            }],
        };

        let definition = FormDefinition::from_config(&config).unwrap();
        let entry = &definition.entries[0];

        assert_eq!(definition.trigger.as_deref(), Some("/profile"));
        assert_eq!(entry.description(), Some("In centimetres"));
        assert!(entry.is_skippable());
        assert_eq!(entry.base_type(), Some(BaseType::Integer));
        assert_eq!(entry.options().map(<[String]>::len), Some(2));
        assert!(definition.check(&NavigationLabels::default()).is_ok());
    }

    #[test]
    fn test_definition_from_config_with_bad_pattern() {
        let config = FormConfig {
            name: "profile".to_string(),
            trigger: "/profile".to_string(),
            completion_message: Some("Saved".to_string()),
            entries: vec![EntryConfig {
                kind: EntryKind::Text,
                title: "Name".to_string(),
                incorrect: "bad".to_string(),
                description: None,
                skippable: false,
                options: None,
                base_type: None,
                pattern: Some("[".to_string()),
            }],
        };

        assert!(FormDefinition::from_config(&config).is_err());
    }
}
