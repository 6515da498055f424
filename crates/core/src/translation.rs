//! Translated text values.
//!
//! A [`TranslationSet`] maps language codes to text. Incoming payloads carry
//! a [`TranslationField`], which may turn out not to be a map at all; turning
//! it into a set is where format and language validation happen.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered list of language codes accepted in translations.
///
/// The first code is the default language (used e.g. for slug derivation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedLanguages {
    codes: Vec<String>,
}

impl SupportedLanguages {
    /// Build from a list of codes. Empty and duplicate entries are dropped.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.into().trim().to_lowercase();
            if !code.is_empty() && !out.contains(&code) {
                out.push(code);
            }
        }
        Self { codes: out }
    }

    /// Parse a comma-separated list such as `"en,fi,sv"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    pub fn default_language(&self) -> Option<&str> {
        self.codes.first().map(String::as_str)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}

impl Default for SupportedLanguages {
    fn default() -> Self {
        Self::new(["en", "fi", "sv"])
    }
}

/// Renders as a Python-style list literal: `['en', 'fi', 'sv']`.
impl fmt::Display for SupportedLanguages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, code) in self.codes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{code}'")?;
        }
        f.write_str("]")
    }
}

/// Errors raised while turning a [`TranslationField`] into a [`TranslationSet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    /// One or more keys are not in the supported list.
    #[error("unsupported languages {codes:?} (supported: {supported})")]
    UnsupportedLanguage {
        codes: Vec<String>,
        supported: String,
    },

    /// The value is not a language → text map.
    #[error("Not a valid translation format. Expecting {{\"lang_code\": {value}}}")]
    InvalidFormat { value: String },
}

impl TranslationError {
    /// Client-facing messages, one per offending language code.
    pub fn messages(&self) -> Vec<String> {
        match self {
            TranslationError::UnsupportedLanguage { codes, supported } => codes
                .iter()
                .map(|code| format!("{code} is not a supported languages ({supported})"))
                .collect(),
            TranslationError::InvalidFormat { .. } => vec![self.to_string()],
        }
    }
}

/// Language code → text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationSet(BTreeMap<String, String>);

impl TranslationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-language set.
    pub fn single(lang: impl Into<String>, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(lang.into(), text.into());
        Self(map)
    }

    /// Text in `lang`, or the empty string when that language is missing.
    pub fn get(&self, lang: &str) -> &str {
        self.0.get(lang).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        self.0.insert(lang.into(), text.into());
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|text| text.is_empty())
    }

    /// Check every key against `supported`.
    pub fn validate(&self, supported: &SupportedLanguages) -> Result<(), TranslationError> {
        let unsupported: Vec<String> = self
            .0
            .keys()
            .filter(|code| !supported.contains(code))
            .cloned()
            .collect();
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(TranslationError::UnsupportedLanguage {
                codes: unsupported,
                supported: supported.to_string(),
            })
        }
    }

    /// Overwrite the languages present in `other`, keeping the rest.
    pub fn merge(&mut self, other: TranslationSet) {
        self.0.extend(other.0);
    }

    /// First non-empty text, preferring `lang`.
    pub fn best(&self, lang: &str) -> &str {
        let preferred = self.get(lang);
        if !preferred.is_empty() {
            return preferred;
        }
        self.0
            .values()
            .find(|text| !text.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TranslationSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A translated field as it arrives in a request body.
///
/// Anything that is not an object of strings lands in `Invalid` so the
/// offending value can be echoed back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslationField {
    Map(BTreeMap<String, String>),
    Invalid(serde_json::Value),
}

impl Default for TranslationField {
    fn default() -> Self {
        TranslationField::Map(BTreeMap::new())
    }
}

impl From<TranslationSet> for TranslationField {
    fn from(set: TranslationSet) -> Self {
        TranslationField::Map(set.0)
    }
}

impl TranslationField {
    /// Validate the field and produce a [`TranslationSet`].
    pub fn into_set(self, supported: &SupportedLanguages) -> Result<TranslationSet, TranslationError> {
        match self {
            TranslationField::Map(map) => {
                let set = TranslationSet(map);
                set.validate(supported)?;
                Ok(set)
            }
            TranslationField::Invalid(value) => Err(TranslationError::InvalidFormat {
                value: match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
            }),
        }
    }
}
