//! Step identifiers and resume matching
//!
//! Every form instance derives one state identifier per entry from its id and
//! the entry title. The identifier of the entry being awaited is persisted, so
//! a handler with no in-memory continuity can recover the position of a form
//! from storage alone.

/// Ordered identifiers `[id + title_0, ..., id + title_n-1]` of one form instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepIdentifiers {
    identifiers: Vec<String>,
}

impl StepIdentifiers {
    /// Derive the identifier list for an instance id and its entry titles
    pub fn new<'a, I>(instance_id: &str, titles: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let identifiers = titles
            .into_iter()
            .map(|title| step_identifier(instance_id, title))
            .collect();

        Self { identifiers }
    }

    /// 1-based position of a persisted identifier, `None` when it belongs elsewhere
    pub fn position(&self, identifier: &str) -> Option<usize> {
        self.identifiers
            .iter()
            .position(|candidate| candidate == identifier)
            .map(|index| index + 1)
    }

    /// Identifier persisted while the entry at `index` is awaited
    pub fn get(&self, index: usize) -> Option<&str> {
        self.identifiers.get(index).map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.position(identifier).is_some()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// Composite key used both as state identifier and as the data key of an entry
pub fn step_identifier(instance_id: &str, title: &str) -> String {
    format!("{}{}", instance_id, title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identifiers_in_entry_order() {
        let steps = StepIdentifiers::new("abc-", ["Name", "Age", "City"]);
        assert_eq!(steps.as_slice(), &["abc-Name", "abc-Age", "abc-City"]);
        assert_eq!(steps.get(1), Some("abc-Age"));
        assert_eq!(steps.get(3), None);
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn test_position_is_one_based() {
        let steps = StepIdentifiers::new("abc-", ["Name", "Age"]);
        assert_eq!(steps.position("abc-Name"), Some(1));
        assert_eq!(steps.position("abc-Age"), Some(2));
        assert_eq!(steps.position("xyz-Name"), None);
        assert_eq!(steps.position("Name"), None);
    }

    #[test]
    fn test_empty_form_has_no_identifiers() {
        let steps = StepIdentifiers::new("abc-", std::iter::empty());
        assert!(steps.is_empty());
        assert!(!steps.contains("abc-"));
    }

    proptest! {
        #[test]
        fn prop_every_identifier_maps_back_to_its_step(
            titles in prop::collection::hash_set("[A-Za-z ]{1,12}", 1..8),
        ) {
            let titles: Vec<String> = titles.into_iter().collect();
            let steps = StepIdentifiers::new("0f7c", titles.iter().map(String::as_str));

            for (index, identifier) in steps.as_slice().iter().enumerate() {
                prop_assert_eq!(steps.position(identifier), Some(index + 1));
            }
        }

        #[test]
        fn prop_instances_never_share_identifiers(
            titles in prop::collection::hash_set("[a-z]{1,8}", 1..6),
        ) {
            let first = StepIdentifiers::new("8c1d4b9e-0000-4000-8000-000000000001", titles.iter().map(String::as_str));
            let second = StepIdentifiers::new("8c1d4b9e-0000-4000-8000-000000000002", titles.iter().map(String::as_str));

            for identifier in first.as_slice() {
                prop_assert!(!second.contains(identifier));
            }
        }
    }
}
