use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field-level validation messages collected while checking a submitted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Vec<String> {
        self.fields.get(field).cloned().unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

pub const REQUIRED: &str = "This field is required.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_group_by_field() {
        let mut errors = FormErrors::new();
        errors.add("text", REQUIRED);
        errors.add("text", "Second problem");
        errors.add("group", "Select a valid choice.");

        assert_eq!(errors.for_field("text").len(), 2);
        assert_eq!(errors.for_field("group"), vec!["Select a valid choice.".to_string()]);
        assert!(errors.for_field("image").is_empty());
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["group", "text"]);
    }

    #[test]
    fn test_into_result() {
        assert_eq!(FormErrors::new().into_result(5), Ok(5));

        let mut errors = FormErrors::new();
        errors.add("text", REQUIRED);
        assert!(errors.into_result(5).is_err());
    }
}
