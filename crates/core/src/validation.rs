//! Field-keyed validation error collection.
//!
//! Every validator in this crate reports into a [`ValidationErrors`] map so a
//! single request surfaces all of its problems at once instead of failing on
//! the first bad field.

use std::collections::BTreeMap;

use serde::Serialize;

/// Field name → human-readable messages.
///
/// Serializes as a plain JSON object (`{"title": ["…"], "sections": ["…"]}`),
/// which is the shape returned to API clients in a 400 response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Record several messages against `field`.
    pub fn extend(&mut self, field: &str, messages: impl IntoIterator<Item = String>) {
        for message in messages {
            self.add(field, message);
        }
    }

    /// Fold another collection into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages recorded for `field` (empty slice if none).
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any message for `field` contains `needle`.
    pub fn contains(&self, field: &str, needle: &str) -> bool {
        self.get(field).iter().any(|m| m.contains(needle))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Fold `validator` derive output into a [`ValidationErrors`] map under a
/// key prefix (e.g. `sections[0].images[1]`).
pub fn collect_validator_errors(
    errors: &mut ValidationErrors,
    prefix: &str,
    source: &validator::ValidationErrors,
) {
    for (field, field_errors) in source.field_errors() {
        let key = format!("{prefix}.{field}");
        for err in field_errors {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value ({})", err.code));
            errors.add(key.clone(), message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn collects_multiple_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "bad title");
        errors.add("sections", "bad sections");
        errors.add("title", "worse title");

        assert_eq!(errors.get("title").len(), 2);
        assert!(errors.contains("sections", "bad"));
        assert!(errors.get("borough").is_empty());
    }

    #[test]
    fn merge_appends_messages() {
        let mut a = ValidationErrors::new();
        a.add("title", "one");
        let mut b = ValidationErrors::new();
        b.add("title", "two");
        b.add("labels", "three");

        a.merge(b);
        assert_eq!(a.get("title"), ["one".to_string(), "two".to_string()]);
        assert_eq!(a.get("labels").len(), 1);
    }

    #[test]
    fn serializes_as_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("sections", "A hearing must have exactly one main section");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sections": ["A hearing must have exactly one main section"]})
        );
    }
}
