//! Navigation labels shown next to every prompt

use crate::config::LabelsConfig;
use crate::utils::errors::{Result, StepperError};

/// Skip / cancel / main-menu button labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLabels {
    /// Also the sentinel persisted for a skipped entry
    pub skip: String,
    pub cancel: String,
    pub main_menu: String,
}

impl NavigationLabels {
    /// Whether a reply would be taken as navigation rather than an answer
    pub fn is_navigation(&self, text: &str) -> bool {
        text == self.skip || text == self.cancel
    }

    /// Labels must be non-empty and pairwise distinct
    pub fn check(&self) -> Result<()> {
        let labels = [&self.skip, &self.cancel, &self.main_menu];

        if labels.iter().any(|label| label.trim().is_empty()) {
            return Err(StepperError::config("Navigation labels must not be empty"));
        }

        if self.skip == self.cancel {
            return Err(StepperError::config("Skip and cancel labels must differ"));
        }

        if self.is_navigation(&self.main_menu) {
            return Err(StepperError::config("Main menu label must differ from skip and cancel"));
        }

        Ok(())
    }
}

impl Default for NavigationLabels {
    fn default() -> Self {
        Self {
            skip: "Skip".to_string(),
            cancel: "Cancel".to_string(),
            main_menu: "Main Menu".to_string(),
        }
    }
}

impl From<&LabelsConfig> for NavigationLabels {
    fn from(config: &LabelsConfig) -> Self {
        Self {
            skip: config.skip.clone(),
            cancel: config.cancel.clone(),
            main_menu: config.main_menu.clone(),
        }
    }
}
