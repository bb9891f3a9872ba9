//! HTTP client for the command/query API.

use crate::catalog::key_tree::{ExportTree, TreeNode};
use crate::catalog::language_forest::LanguageNode;
use crate::command::{Command, CommandOutcome, CommandResponse};
use crate::metrics::MetricsReport;
use crate::model::{Key, LanguageId, TranslationRequest, TranslationRequestId};
use crate::query::{BaseData, KeyDetail, LanguageExport};
use crate::retry::{with_retry_if, RetryConfig};
use crate::server::ACTOR_HEADER;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a structured error
    #[error("{message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response (HTTP {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },
}

impl ClientError {
    /// Error code, in the same taxonomy the server uses.
    pub fn code(&self) -> &str {
        match self {
            Self::Rejected { code, .. } => code,
            Self::Transport(_) => "TransportError",
            Self::UnexpectedResponse { .. } => "UnexpectedResponse",
        }
    }

    /// Transport failures and server-side (5xx) failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } | Self::UnexpectedResponse { status, .. } => {
                *status >= 500
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    actor: Option<String>,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            actor: None,
            retry: RetryConfig::query(),
        })
    }

    /// Name recorded as creator of entities this client creates.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Retry policy for queries.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ==================== Commands ====================

    /// Submit one command. Never retried: a lost response does not mean the
    /// command was not applied.
    pub async fn execute(&self, command: &Command) -> Result<CommandOutcome, ClientError> {
        let url = format!("{}/api/command", self.base_url);
        debug!("Submitting {}", command.name());

        let mut request = self.http.post(&url).json(command);
        if let Some(actor) = &self.actor {
            request = request.header(ACTOR_HEADER, actor);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        match serde_json::from_str::<CommandResponse>(&body) {
            Ok(CommandResponse::Ok { data }) => Ok(data),
            Ok(CommandResponse::Error { error }) => Err(ClientError::Rejected {
                status,
                code: error.code,
                message: error.message,
            }),
            Err(_) => Err(ClientError::UnexpectedResponse { status, body }),
        }
    }

    // ==================== Queries ====================

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.get("/health", &[]).await
    }

    pub async fn base_data(&self) -> Result<BaseData, ClientError> {
        self.get("/api/base-data", &[]).await
    }

    pub async fn key_detail(&self, key: &str) -> Result<KeyDetail, ClientError> {
        self.get(&format!("/api/translations/{}", key), &[]).await
    }

    pub async fn translation_request(
        &self,
        id: TranslationRequestId,
    ) -> Result<TranslationRequest, ClientError> {
        self.get(&format!("/api/requests/{}", id), &[]).await
    }

    pub async fn search_keys(&self, term: &str) -> Result<Vec<Key>, ClientError> {
        self.get("/api/keys/search", &[("q", term)]).await
    }

    pub async fn key_tree(&self) -> Result<BTreeMap<String, TreeNode>, ClientError> {
        self.get("/api/keys/tree", &[]).await
    }

    pub async fn language_forest(&self) -> Result<Vec<LanguageNode>, ClientError> {
        self.get("/api/languages/tree", &[]).await
    }

    pub async fn export_key_tree(&self) -> Result<ExportTree, ClientError> {
        self.get("/api/export/keys", &[]).await
    }

    pub async fn export_language(
        &self,
        language_id: &LanguageId,
        fallback: bool,
    ) -> Result<LanguageExport, ClientError> {
        let fallback = if fallback { "true" } else { "false" };
        self.get(
            &format!("/api/export/languages/{}", language_id),
            &[("fallback", fallback)],
        )
        .await
    }

    pub async fn metrics(&self) -> Result<MetricsReport, ClientError> {
        self.get("/api/metrics", &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();

        with_retry_if(
            &self.retry,
            path,
            move || self.get_once(url, query),
            ClientError::is_retryable,
        )
        .await
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|_| ClientError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<CommandResponse>(&body) {
            Ok(CommandResponse::Error { error }) => Err(ClientError::Rejected {
                status: status.as_u16(),
                code: error.code,
                message: error.message,
            }),
            _ => Err(ClientError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CreateKey;
    use crate::model::KeyId;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Helper Functions ====================

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri())
            .expect("client")
            .with_retry(RetryConfig::new(3, Duration::from_millis(10)))
    }

    fn create_key() -> Command {
        Command::CreateKey(CreateKey {
            key: "greeting.hello".into(),
            description: None,
        })
    }

    // ==================== Command Tests ====================

    #[tokio::test]
    async fn test_execute_returns_outcome() {
        let mock_server = MockServer::start().await;
        let key = Key {
            id: KeyId::new(),
            key: "greeting.hello".into(),
            description: None,
            created_at: Utc::now(),
            created_by: Some("alice".into()),
        };

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .and(header("x-translator-actor", "alice"))
            .and(body_partial_json(json!({"cmd": "CreateKey", "data": {"key": "greeting.hello"}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"kind": "KeyCreated", "entity": key}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = client(&mock_server)
            .with_actor("alice")
            .execute(&create_key())
            .await
            .expect("execute");
        assert_eq!(outcome, CommandOutcome::KeyCreated(key));
    }

    #[tokio::test]
    async fn test_execute_surfaces_error_code() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": "DuplicateKey", "message": "key 'greeting.hello' already exists"}
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).execute(&create_key()).await.unwrap_err();
        assert_eq!(err.code(), "DuplicateKey");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_execute_is_never_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).execute(&create_key()).await.unwrap_err();
        assert_eq!(err.code(), "UnexpectedResponse");
    }

    // ==================== Query Tests ====================

    #[tokio::test]
    async fn test_query_retries_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/base-data"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/base-data"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"keys": [], "languages": []})),
            )
            .mount(&mock_server)
            .await;

        let base = client(&mock_server).base_data().await.expect("base data");
        assert!(base.keys.is_empty());
    }

    #[tokio::test]
    async fn test_query_does_not_retry_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/export/languages/xx"))
            .and(query_param("fallback", "true"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "NotFound", "message": "language 'xx' not found"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .export_language(&"xx".into(), true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:1")
            .expect("client")
            .with_retry(RetryConfig::none());

        let err = client.base_data().await.unwrap_err();
        assert_eq!(err.code(), "TransportError");
        assert!(err.is_retryable());
    }
}
