//! Structured command/query errors.
//!
//! Every variant carries a stable string code that travels over the wire and
//! that clients map to user-facing messages.

use crate::catalog::identifier::InvalidReason;
use crate::catalog::key_tree::{ConflictKind, KeyConflict};
use crate::model::LanguageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error class, used for HTTP status mapping and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed input, caught before touching the store
    Validation,
    /// Invariant violation
    Conflict,
    /// Referenced entity absent
    NotFound,
    /// The store could not be read or persisted
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: InvalidReason },

    #[error("invalid language code '{code}': {reason}")]
    InvalidLanguageCode { code: String, reason: InvalidReason },

    #[error("key '{key}' already exists")]
    DuplicateKey { key: String },

    #[error("key '{key}' would be nested under existing key '{existing}'")]
    NestedUnderLeaf { key: String, existing: String },

    #[error("key '{key}' is a namespace of existing key '{existing}'")]
    ParentOfExisting { key: String, existing: String },

    #[error("key is already named '{key}'")]
    UnchangedName { key: String },

    #[error("language '{id}' already exists")]
    DuplicateLanguage { id: LanguageId },

    #[error("unknown parent language '{parent_id}'")]
    UnknownParent { parent_id: LanguageId },

    #[error("language '{id}' cannot take '{parent_id}' as parent: it would form a cycle")]
    ParentCycle { id: LanguageId, parent_id: LanguageId },

    #[error("unknown key '{key}'")]
    UnknownKey { key: String },

    #[error("unknown language '{id}'")]
    UnknownLanguage { id: LanguageId },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl CommandError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::InvalidKey { .. } => "InvalidKey",
            Self::InvalidLanguageCode { .. } => "InvalidLanguageCode",
            Self::DuplicateKey { .. } => "DuplicateKey",
            Self::NestedUnderLeaf { .. } => "NestedUnderLeaf",
            Self::ParentOfExisting { .. } => "ParentOfExisting",
            Self::UnchangedName { .. } => "UnchangedName",
            Self::DuplicateLanguage { .. } => "DuplicateLanguage",
            Self::UnknownParent { .. } => "UnknownParent",
            Self::ParentCycle { .. } => "ParentCycle",
            Self::UnknownKey { .. } => "UnknownKey",
            Self::UnknownLanguage { .. } => "UnknownLanguage",
            Self::NotFound { .. } => "NotFound",
            Self::Storage(_) => "StorageError",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidKey { .. }
            | Self::InvalidLanguageCode { .. }
            | Self::UnchangedName { .. } => ErrorKind::Validation,
            Self::DuplicateKey { .. }
            | Self::NestedUnderLeaf { .. }
            | Self::ParentOfExisting { .. }
            | Self::DuplicateLanguage { .. }
            | Self::ParentCycle { .. } => ErrorKind::Conflict,
            Self::UnknownParent { .. }
            | Self::UnknownKey { .. }
            | Self::UnknownLanguage { .. }
            | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Turn a namespace-tree collision for `candidate` into a command error.
    pub fn from_conflict(candidate: &str, conflict: KeyConflict) -> Self {
        let key = candidate.to_string();
        match conflict.kind {
            ConflictKind::DuplicateKey => Self::DuplicateKey { key },
            ConflictKind::NestedUnderLeaf => Self::NestedUnderLeaf {
                key,
                existing: conflict.conflicting_key,
            },
            ConflictKind::ParentOfExisting => Self::ParentOfExisting {
                key,
                existing: conflict.conflicting_key,
            },
        }
    }
}

/// Wire form of an error: `{ "code": ..., "message": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,

    #[serde(default)]
    pub message: String,
}

impl From<&CommandError> for ErrorBody {
    fn from(error: &CommandError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_taxonomy() {
        assert_eq!(
            CommandError::DuplicateKey { key: "a".into() }.code(),
            "DuplicateKey"
        );
        assert_eq!(
            CommandError::UnknownParent {
                parent_id: "en".into()
            }
            .code(),
            "UnknownParent"
        );
        assert_eq!(
            CommandError::NotFound {
                entity: "key",
                id: "x".into()
            }
            .code(),
            "NotFound"
        );
        assert_eq!(CommandError::Validation("bad".into()).code(), "ValidationError");
        assert_eq!(CommandError::Storage("disk".into()).code(), "StorageError");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CommandError::NestedUnderLeaf {
                key: "a.b".into(),
                existing: "a".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CommandError::UnknownLanguage { id: "xx".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CommandError::UnchangedName { key: "a".into() }.kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_from_conflict() {
        let conflict = KeyConflict {
            kind: ConflictKind::ParentOfExisting,
            conflicting_key: "a.b".to_string(),
        };
        assert_eq!(
            CommandError::from_conflict("a", conflict),
            CommandError::ParentOfExisting {
                key: "a".into(),
                existing: "a.b".into()
            }
        );
    }

    #[test]
    fn test_error_body_carries_code_and_message() {
        let error = CommandError::DuplicateKey {
            key: "greeting.hello".into(),
        };
        let body = ErrorBody::from(&error);
        assert_eq!(body.code, "DuplicateKey");
        assert!(body.message.contains("greeting.hello"));
    }
}
