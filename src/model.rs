//! Core records: keys, languages, translations and translation requests.
//!
//! Keys are identified internally by [`KeyId`]; the dot-delimited key string is
//! only a lookup alias resolved at the command/query boundary. Languages are
//! identified by their code (e.g. "en", "pt-BR").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type used for every record.
pub type Timestamp = DateTime<Utc>;

/// Stable identifier of a key, independent of its (renamable) key string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for KeyId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

/// Identifier of a translation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationId(Uuid);

impl TranslationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TranslationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TranslationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TranslationId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

/// Identifier of a translation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationRequestId(Uuid);

impl TranslationRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TranslationRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TranslationRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TranslationRequestId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

/// Language code doubling as the language's unique id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(String);

impl LanguageId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for LanguageId {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// A translation key such as `greeting.hello`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub id: KeyId,

    /// Full dot-delimited key string
    pub key: String,

    pub description: Option<String>,

    pub created_at: Timestamp,

    pub created_by: Option<String>,
}

impl Key {
    /// Split the key string into its namespace segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.key.split('.')
    }
}

/// A language, optionally derived from a parent language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub id: LanguageId,

    /// Display name (e.g. "English")
    pub name: String,

    pub parent_id: Option<LanguageId>,

    pub created_at: Timestamp,

    pub created_by: Option<String>,
}

/// The value of one key in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub id: TranslationId,

    pub key_id: KeyId,

    pub language_id: LanguageId,

    pub value: String,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,

    pub created_by: Option<String>,
}

/// A proposed value for one key in one language, pending review.
///
/// Several requests may exist for the same pair. They never touch the
/// translation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub id: TranslationRequestId,

    pub key_id: KeyId,

    pub language_id: LanguageId,

    /// Proposed value
    pub translation: String,

    pub comment: Option<String>,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,

    pub created_by: Option<String>,
}
