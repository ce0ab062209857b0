//! Form entries
//!
//! An entry describes one field of a form: the prompt shown to the user, the
//! rule a reply must satisfy and the type its stored value is coerced into.
//! Entries are plain descriptors; validation never mutates them.

use std::collections::HashMap;
use std::fmt;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::utils::errors::{StepperError, Result};
use super::labels::NavigationLabels;

/// Accepted date formats, tried in order; the first one that parses wins
pub const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y", "%Y.%m.%d", "%d.%m.%Y", "%m.%d.%Y"];

/// Closed set of entry kinds, each with its own validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Text,
    Number,
    Date,
    OneOf,
    Url,
    File,
}

impl EntryKind {
    /// Result type used when an entry does not override it
    pub fn default_base_type(self) -> BaseType {
        match self {
            EntryKind::Text | EntryKind::OneOf => BaseType::Text,
            EntryKind::Number => BaseType::Integer,
            EntryKind::Date => BaseType::Date,
            EntryKind::Url => BaseType::Url,
            EntryKind::File => BaseType::FileRef,
        }
    }
}

/// Semantic type a stored answer is coerced into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    Text,
    Integer,
    Date,
    Url,
    FileRef,
}

/// A typed answer from a completed form
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    Url(Url),
    File(String),
}

impl AnswerValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) | AnswerValue::File(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AnswerValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            AnswerValue::Date(date) => Some(*date),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Text(text) => write!(f, "{}", text),
            AnswerValue::Integer(value) => write!(f, "{}", value),
            AnswerValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            AnswerValue::Url(url) => write!(f, "{}", url),
            AnswerValue::File(file_id) => write!(f, "file:{}", file_id),
        }
    }
}

/// An incoming reply as seen by the stepper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Message text or button callback data
    Text(String),
    /// An uploaded document, identified by the transport's file id
    File { file_id: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn file(file_id: impl Into<String>) -> Self {
        Reply::File { file_id: file_id.into() }
    }

    /// Text content of the reply, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::File { .. } => None,
        }
    }
}

/// Field descriptor of a multi-step form
#[derive(Debug, Clone)]
pub struct Entry {
    kind: EntryKind,
    title: String,
    incorrect: String,
    description: Option<String>,
    skippable: bool,
    options: Option<Vec<String>>,
    base_type: Option<BaseType>,
    pattern: Option<Regex>,
}

impl Entry {
    /// Create an entry of the given kind with its default result type
    pub fn new(kind: EntryKind, title: impl Into<String>, incorrect: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            incorrect: incorrect.into(),
            description: None,
            skippable: false,
            options: None,
            base_type: Some(kind.default_base_type()),
            pattern: None,
        }
    }

    /// Free text, any non-blank reply
    pub fn text(title: impl Into<String>, incorrect: impl Into<String>) -> Self {
        Self::new(EntryKind::Text, title, incorrect)
    }

    /// Non-negative whole number
    pub fn number(title: impl Into<String>, incorrect: impl Into<String>) -> Self {
        Self::new(EntryKind::Number, title, incorrect)
    }

    /// Calendar date in one of [`DATE_FORMATS`]
    pub fn date(title: impl Into<String>, incorrect: impl Into<String>) -> Self {
        Self::new(EntryKind::Date, title, incorrect)
    }

    /// Absolute URL
    pub fn url(title: impl Into<String>, incorrect: impl Into<String>) -> Self {
        Self::new(EntryKind::Url, title, incorrect)
    }

    /// Uploaded document or photo, stored by file id
    pub fn file(title: impl Into<String>, incorrect: impl Into<String>) -> Self {
        Self::new(EntryKind::File, title, incorrect)
    }

    /// Exactly one of the given options
    pub fn one_of<I, S>(title: impl Into<String>, incorrect: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(EntryKind::OneOf, title, incorrect).with_options(options)
    }

    /// Shown under the title in the prompt
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Allow the skip label as an answer
    pub fn skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    /// Options double as quick-reply buttons for every kind and as the
    /// accepted set for one-of entries
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Override the type answers are coerced to
    pub fn with_base_type(mut self, base_type: BaseType) -> Self {
        self.base_type = Some(base_type);
        self
    }

    /// Require text answers to match a regular expression
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| StepperError::config(format!("Invalid pattern for entry '{}': {}", self.title, e)))?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// `None` makes the entry invalid; construction rejects it
    pub fn set_base_type(&mut self, base_type: Option<BaseType>) {
        self.base_type = base_type;
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Message sent when a reply is rejected
    pub fn incorrect(&self) -> &str {
        &self.incorrect
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the skip label is accepted
    pub fn is_skippable(&self) -> bool {
        self.skippable
    }

    /// Configured options, if any
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }

    /// Type the stored answer is coerced to
    pub fn base_type(&self) -> Option<BaseType> {
        self.base_type
    }

    /// Check the descriptor itself, independent of any reply
    pub fn check(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(StepperError::config("Entry title must not be empty"));
        }

        if self.base_type.is_none() {
            return Err(StepperError::config(format!("Base type not provided for entry '{}'", self.title)));
        }

        if self.kind == EntryKind::OneOf {
            self.required_options()?;
        }

        Ok(())
    }

    /// Check whether a reply satisfies this entry.
    ///
    /// Returns `Ok(false)` for a rejected reply; errors only on a misconfigured entry.
    pub fn validate_answer(&self, reply: &Reply) -> Result<bool> {
        let valid = match (self.kind, reply) {
            (EntryKind::File, Reply::File { file_id }) => !file_id.is_empty(),
            (EntryKind::File, Reply::Text(_)) | (_, Reply::File { .. }) => false,
            (EntryKind::Text, Reply::Text(text)) => {
                !text.trim().is_empty()
                    && self.pattern.as_ref().map_or(true, |pattern| pattern.is_match(text))
            }
            (EntryKind::Number, Reply::Text(text)) => parse_integer(text).is_some(),
            (EntryKind::Date, Reply::Text(text)) => parse_date(text).is_some(),
            (EntryKind::Url, Reply::Text(text)) => parse_url(text).is_some(),
            (EntryKind::OneOf, Reply::Text(text)) => {
                let options = self.required_options()?;
                !text.is_empty() && options.iter().any(|option| option == text)
            }
        };

        Ok(valid)
    }

    /// Raw value to persist for an accepted reply
    pub fn raw_value(&self, reply: &Reply) -> Option<String> {
        match (self.kind, reply) {
            (EntryKind::File, Reply::File { file_id }) => Some(file_id.clone()),
            (EntryKind::File, Reply::Text(_)) => None,
            (_, Reply::Text(text)) => Some(text.clone()),
            (_, Reply::File { .. }) => None,
        }
    }

    /// Look up this entry's raw value by title and coerce it to the base type
    pub fn get_answer(&self, results: &HashMap<String, String>) -> Result<AnswerValue> {
        let raw = results.get(&self.title).ok_or_else(|| StepperError::Coercion {
            title: self.title.clone(),
            reason: "no value stored".to_string(),
        })?;

        self.coerce(raw)
    }

    /// Coerce one raw value to the base type
    pub fn coerce(&self, raw: &str) -> Result<AnswerValue> {
        let base_type = self.base_type
            .ok_or_else(|| StepperError::config(format!("Base type not provided for entry '{}'", self.title)))?;

        let coercion_error = |reason: &str| StepperError::Coercion {
            title: self.title.clone(),
            reason: format!("{} ({:?})", reason, raw),
        };

        match base_type {
            BaseType::Text => Ok(AnswerValue::Text(raw.to_string())),
            BaseType::FileRef => Ok(AnswerValue::File(raw.to_string())),
            BaseType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(AnswerValue::Integer)
                .map_err(|_| coercion_error("not an integer")),
            BaseType::Date => parse_date(raw)
                .map(AnswerValue::Date)
                .ok_or_else(|| coercion_error("not a date")),
            BaseType::Url => parse_url(raw)
                .map(AnswerValue::Url)
                .ok_or_else(|| coercion_error("not a url")),
        }
    }

    /// Quick-reply buttons offered with this entry's prompt
    pub fn buttons(&self, labels: &NavigationLabels) -> Vec<String> {
        let mut buttons = self.options.clone().unwrap_or_default();
        if self.skippable {
            buttons.push(labels.skip.clone());
        }
        buttons.push(labels.cancel.clone());
        buttons
    }

    /// Prompt text: the title, then the description when present
    pub fn prompt_text(&self) -> String {
        match &self.description {
            Some(description) => format!("{}\n\n{}", self.title, description),
            None => self.title.clone(),
        }
    }

    fn required_options(&self) -> Result<&[String]> {
        match self.options.as_deref() {
            Some(options) if !options.is_empty() => Ok(options),
            _ => Err(StepperError::config(format!("Options not provided for entry '{}'", self.title))),
        }
    }
}

/// Digits only, and small enough for an i64
fn parse_integer(text: &str) -> Option<i64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parse a date with the first matching entry of [`DATE_FORMATS`]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Absolute URL with both scheme and host
fn parse_url(text: &str) -> Option<Url> {
    Url::parse(text)
        .ok()
        .filter(|url| !url.scheme().is_empty() && url.host_str().map_or(false, |host| !host.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(entry: &Entry, text: &str) -> bool {
        entry.validate_answer(&Reply::text(text)).unwrap()
    }

    #[test]
    fn test_text_entry() {
        let entry = Entry::text("Name", "Please enter a valid name");
        assert!(ok(&entry, "John"));
        assert!(!ok(&entry, ""));
        assert!(!ok(&entry, "   "));
        assert!(!entry.validate_answer(&Reply::file("doc-1")).unwrap());
    }

    #[test]
    fn test_text_entry_with_pattern() {
        let entry = Entry::text("Name", "Letters only").with_pattern(r"^[A-Za-z ]+$").unwrap();
        assert!(ok(&entry, "Ada Lovelace"));
        assert!(!ok(&entry, "R2D2"));
        assert!(Entry::text("Name", "bad").with_pattern("(").is_err());
    }

    #[test]
    fn test_number_entry() {
        let entry = Entry::number("Age", "bad age");
        assert!(ok(&entry, "25"));
        assert!(ok(&entry, "0"));
        assert!(!ok(&entry, "abc"));
        assert!(!ok(&entry, "-5"));
        assert!(!ok(&entry, "2.5"));
        assert!(!ok(&entry, ""));
        assert!(!ok(&entry, "99999999999999999999999"));
    }

    #[test]
    fn test_date_entry_formats() {
        let entry = Entry::date("Birthday", "bad date");
        for text in ["2024-03-15", "15-03-2024", "03-15-2024", "2024.03.15", "15.03.2024", "03.15.2024"] {
            assert!(ok(&entry, text), "{} should be accepted", text);
        }
        assert!(!ok(&entry, "15/03/2024"));
        assert!(!ok(&entry, "tomorrow"));
        assert!(!ok(&entry, "2024-13-45"));
    }

    #[test]
    fn test_date_first_format_wins() {
        // Valid as both day-first and month-first; day-first is listed earlier.
        let date = parse_date("04-05-2024").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
    }

    #[test]
    fn test_url_entry() {
        let entry = Entry::url("Website", "bad url");
        assert!(ok(&entry, "https://example.com"));
        assert!(ok(&entry, "http://example.com/path?q=1"));
        assert!(!ok(&entry, "example.com"));
        assert!(!ok(&entry, "mailto:someone@example.com"));
        assert!(!ok(&entry, "not a url"));
    }

    #[test]
    fn test_one_of_entry() {
        let entry = Entry::one_of("Role", "pick one", ["Leader", "Follower"]);
        assert!(ok(&entry, "Leader"));
        assert!(!ok(&entry, "leader"));
        assert!(!ok(&entry, ""));
    }

    #[test]
    fn test_one_of_without_options_is_config_error() {
        let entry = Entry::new(EntryKind::OneOf, "Role", "pick one");
        assert!(matches!(entry.validate_answer(&Reply::text("Leader")), Err(StepperError::Config(_))));
        assert!(entry.check().is_err());
    }

    #[test]
    fn test_file_entry() {
        let entry = Entry::file("CV", "attach a document");
        assert!(entry.validate_answer(&Reply::file("BQACAgIAAxk")).unwrap());
        assert!(!entry.validate_answer(&Reply::file("")).unwrap());
        assert!(!entry.validate_answer(&Reply::text("cv.pdf")).unwrap());
        assert_eq!(entry.raw_value(&Reply::file("BQACAgIAAxk")), Some("BQACAgIAAxk".to_string()));
        assert_eq!(entry.raw_value(&Reply::text("cv.pdf")), None);
    }

    #[test]
    fn test_get_answer_coercion() {
        let mut results = HashMap::new();
        results.insert("Age".to_string(), "25".to_string());
        results.insert("Birthday".to_string(), "15.03.1990".to_string());
        results.insert("Website".to_string(), "https://example.com".to_string());

        assert_eq!(Entry::number("Age", "bad").get_answer(&results).unwrap(), AnswerValue::Integer(25));
        assert_eq!(
            Entry::date("Birthday", "bad").get_answer(&results).unwrap().as_date(),
            NaiveDate::from_ymd_opt(1990, 3, 15)
        );
        assert_eq!(
            Entry::url("Website", "bad").get_answer(&results).unwrap().to_string(),
            "https://example.com/"
        );
        assert_eq!(Entry::text("Age", "bad").get_answer(&results).unwrap(), AnswerValue::Text("25".to_string()));
    }

    #[test]
    fn test_get_answer_without_base_type() {
        let mut entry = Entry::number("Age", "bad");
        entry.set_base_type(None);

        let mut results = HashMap::new();
        results.insert("Age".to_string(), "25".to_string());

        assert!(matches!(entry.get_answer(&results), Err(StepperError::Config(_))));
        assert!(entry.check().is_err());
    }

    #[test]
    fn test_base_type_override() {
        let entry = Entry::text("Count", "bad").with_base_type(BaseType::Integer);
        let mut results = HashMap::new();
        results.insert("Count".to_string(), "7".to_string());
        assert_eq!(entry.get_answer(&results).unwrap().as_i64(), Some(7));
        assert!(entry.validate_answer(&Reply::text("seven")).unwrap());
        assert!(matches!(entry.coerce("seven"), Err(StepperError::Coercion { .. })));
    }

    #[test]
    fn test_buttons_and_prompt() {
        let labels = NavigationLabels::default();

        let entry = Entry::one_of("Role", "pick one", ["Leader", "Follower"])
            .skippable(true)
            .with_description("How do you dance?");
        assert_eq!(entry.buttons(&labels), vec!["Leader", "Follower", "Skip", "Cancel"]);
        assert_eq!(entry.prompt_text(), "Role\n\nHow do you dance?");

        let plain = Entry::text("Name", "bad");
        assert_eq!(plain.buttons(&labels), vec!["Cancel"]);
        assert_eq!(plain.prompt_text(), "Name");
    }
}
