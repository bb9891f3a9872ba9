//! Command envelope, payloads and the result contract.
//!
//! Wire shape: `{ "cmd": "<CommandName>", "data": { ... } }`. Payload field
//! names accept both the camelCase and snake_case spellings clients send.

use crate::error::{CommandError, ErrorBody};
use crate::model::{
    Key, KeyId, Language, LanguageId, Translation, TranslationId, TranslationRequest,
    TranslationRequestId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLanguage {
    #[serde(alias = "code")]
    pub id: LanguageId,

    pub name: String,

    #[serde(
        rename = "parentId",
        alias = "parent_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<LanguageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLanguage {
    pub id: LanguageId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        rename = "parentId",
        alias = "parent_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<LanguageId>,

    /// Make the language a root
    #[serde(rename = "clearParent", alias = "clear_parent", default)]
    pub clear_parent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLanguage {
    pub id: LanguageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKey {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameKey {
    pub id: KeyId,

    #[serde(rename = "newKey", alias = "new_key")]
    pub new_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<KeyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Names a key either by id or by key string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<KeyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Upsert payload shared by the translation commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTranslation {
    #[serde(alias = "languageId", alias = "language")]
    pub lang: LanguageId,

    #[serde(
        rename = "keyId",
        alias = "key_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub key_id: Option<KeyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTranslation {
    #[serde(alias = "languageId", alias = "language")]
    pub lang: LanguageId,

    #[serde(
        rename = "keyId",
        alias = "key_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub key_id: Option<KeyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Propose a value for a key in a language without changing the translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTranslationRequest {
    #[serde(alias = "languageId", alias = "language")]
    pub lang: LanguageId,

    #[serde(
        rename = "keyId",
        alias = "key_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub key_id: Option<KeyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub translation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Omitted fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTranslationRequest {
    pub id: TranslationRequestId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A mutating operation submitted to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Command {
    CreateLanguage(CreateLanguage),
    UpdateLanguage(UpdateLanguage),
    DeleteLanguage(DeleteLanguage),
    CreateKey(CreateKey),
    RenameKey(RenameKey),
    UpdateKey(UpdateKey),
    DeleteKey(KeySelector),
    CreateTranslation(SetTranslation),
    UpdateTranslation(SetTranslation),
    #[serde(rename = "translate")]
    Translate(SetTranslation),
    DeleteTranslation(DeleteTranslation),
    CreateTranslationRequest(CreateTranslationRequest),
    UpdateTranslationRequest(UpdateTranslationRequest),
}

impl Command {
    /// Wire name, used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateLanguage(_) => "CreateLanguage",
            Self::UpdateLanguage(_) => "UpdateLanguage",
            Self::DeleteLanguage(_) => "DeleteLanguage",
            Self::CreateKey(_) => "CreateKey",
            Self::RenameKey(_) => "RenameKey",
            Self::UpdateKey(_) => "UpdateKey",
            Self::DeleteKey(_) => "DeleteKey",
            Self::CreateTranslation(_) => "CreateTranslation",
            Self::UpdateTranslation(_) => "UpdateTranslation",
            Self::Translate(_) => "translate",
            Self::DeleteTranslation(_) => "DeleteTranslation",
            Self::CreateTranslationRequest(_) => "CreateTranslationRequest",
            Self::UpdateTranslationRequest(_) => "UpdateTranslationRequest",
        }
    }
}

/// The exact delta a successful command applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entity")]
pub enum CommandOutcome {
    LanguageCreated(Language),
    LanguageUpdated(Language),
    LanguageDeleted {
        deleted: Vec<LanguageId>,
        orphaned: Vec<LanguageId>,
        #[serde(rename = "removedTranslations")]
        removed_translations: Vec<TranslationId>,
        #[serde(rename = "removedRequests", default)]
        removed_requests: Vec<TranslationRequestId>,
    },
    KeyCreated(Key),
    KeyRenamed(Key),
    KeyUpdated(Key),
    KeyDeleted {
        id: KeyId,
        #[serde(rename = "removedTranslations")]
        removed_translations: Vec<TranslationId>,
        #[serde(rename = "removedRequests", default)]
        removed_requests: Vec<TranslationRequestId>,
    },
    TranslationSaved {
        translation: Translation,
        created: bool,
    },
    TranslationDeleted {
        id: TranslationId,
    },
    TranslationRequestCreated(TranslationRequest),
    TranslationRequestUpdated(TranslationRequest),
}

/// Response envelope: `{ "data": outcome }` or `{ "error": { code, message } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Ok { data: CommandOutcome },
    Error { error: ErrorBody },
}

impl CommandResponse {
    pub fn into_result(self) -> Result<CommandOutcome, ErrorBody> {
        match self {
            Self::Ok { data } => Ok(data),
            Self::Error { error } => Err(error),
        }
    }
}

impl From<Result<CommandOutcome, CommandError>> for CommandResponse {
    fn from(result: Result<CommandOutcome, CommandError>) -> Self {
        match result {
            Ok(data) => Self::Ok { data },
            Err(error) => Self::Error {
                error: ErrorBody::from(&error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Envelope Parsing Tests ====================

    #[test]
    fn test_parse_create_language_with_code_and_parent_aliases() {
        let camel: Command = serde_json::from_value(json!({
            "cmd": "CreateLanguage",
            "data": { "code": "fr", "name": "French", "parentId": "en" }
        }))
        .expect("parse camelCase");
        let snake: Command = serde_json::from_value(json!({
            "cmd": "CreateLanguage",
            "data": { "id": "fr", "name": "French", "parent_id": "en" }
        }))
        .expect("parse snake_case");

        assert_eq!(camel, snake);
        match camel {
            Command::CreateLanguage(payload) => {
                assert_eq!(payload.id.as_str(), "fr");
                assert_eq!(payload.parent_id, Some(LanguageId::from("en")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_key_without_description() {
        let command: Command = serde_json::from_value(json!({
            "cmd": "CreateKey",
            "data": { "key": "greeting.hello" }
        }))
        .expect("parse");
        assert_eq!(
            command,
            Command::CreateKey(CreateKey {
                key: "greeting.hello".into(),
                description: None
            })
        );
        assert_eq!(command.name(), "CreateKey");
    }

    #[test]
    fn test_parse_translation_with_language_aliases() {
        let key_id = KeyId::new();
        let command: Command = serde_json::from_value(json!({
            "cmd": "UpdateTranslation",
            "data": { "languageId": "en", "keyId": key_id, "value": "Hi" }
        }))
        .expect("parse");

        match command {
            Command::UpdateTranslation(payload) => {
                assert_eq!(payload.lang.as_str(), "en");
                assert_eq!(payload.key_id, Some(key_id));
                assert_eq!(payload.key, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_translate_and_delete_key_by_string() {
        let command: Command = serde_json::from_value(json!({
            "cmd": "translate",
            "data": { "lang": "en", "key": "greeting.hello", "value": "Hi" }
        }))
        .expect("parse translate");
        assert_eq!(command.name(), "translate");

        let command: Command = serde_json::from_value(json!({
            "cmd": "DeleteKey",
            "data": { "key": "greeting.hello" }
        }))
        .expect("parse delete");
        assert_eq!(
            command,
            Command::DeleteKey(KeySelector {
                id: None,
                key: Some("greeting.hello".into())
            })
        );
    }

    #[test]
    fn test_parse_translation_request_commands() {
        let command: Command = serde_json::from_value(json!({
            "cmd": "CreateTranslationRequest",
            "data": { "language": "fr", "key": "greeting", "translation": "Salut", "comment": "less formal" }
        }))
        .expect("parse create");
        match &command {
            Command::CreateTranslationRequest(payload) => {
                assert_eq!(payload.lang.as_str(), "fr");
                assert_eq!(payload.comment.as_deref(), Some("less formal"));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(command.name(), "CreateTranslationRequest");

        let id = TranslationRequestId::new();
        let command: Command = serde_json::from_value(json!({
            "cmd": "UpdateTranslationRequest",
            "data": { "id": id, "comment": "typo" }
        }))
        .expect("parse update");
        assert_eq!(
            command,
            Command::UpdateTranslationRequest(UpdateTranslationRequest {
                id,
                translation: None,
                comment: Some("typo".into()),
            })
        );
    }

    #[test]
    fn test_deleted_outcome_without_removed_requests_parses() {
        let outcome: CommandOutcome = serde_json::from_value(json!({
            "kind": "KeyDeleted",
            "entity": { "id": KeyId::new(), "removedTranslations": [] }
        }))
        .expect("parse");
        assert!(matches!(
            outcome,
            CommandOutcome::KeyDeleted { ref removed_requests, .. } if removed_requests.is_empty()
        ));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let result: Result<Command, _> = serde_json::from_value(json!({
            "cmd": "DropDatabase",
            "data": {}
        }));
        assert!(result.is_err());
    }

    // ==================== Response Envelope Tests ====================

    #[test]
    fn test_error_response_shape() {
        let result: Result<CommandOutcome, CommandError> = Err(CommandError::DuplicateKey {
            key: "a.b".into(),
        });
        let response = CommandResponse::from(result);
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["error"]["code"], "DuplicateKey");

        let parsed: CommandResponse = serde_json::from_value(json).expect("parse");
        assert_eq!(parsed.into_result().unwrap_err().code, "DuplicateKey");
    }

    #[test]
    fn test_outcome_response_shape() {
        let id = KeyId::new();
        let response = CommandResponse::from(Ok(CommandOutcome::KeyDeleted {
            id,
            removed_translations: vec![],
            removed_requests: vec![],
        }));
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["data"]["kind"], "KeyDeleted");
        assert_eq!(json["data"]["entity"]["id"], json!(id));
        assert!(json["data"]["entity"]["removedTranslations"].is_array());

        let parsed: CommandResponse = serde_json::from_value(json).expect("parse");
        assert!(parsed.into_result().is_ok());
    }
}
