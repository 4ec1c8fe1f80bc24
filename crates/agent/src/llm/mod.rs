//! Reply generation collaborator.
//!
//! The model only phrases the reply. Scores, states and next actions never
//! depend on what it returns.

pub mod ollama;
pub mod openai;
#[cfg(test)]
pub(crate) mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use propbot_core::config::{LlmConfig, LlmProvider};
use propbot_core::errors::{ApplicationError, UpstreamFailure};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// System instruction, prior turns and the message being answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub message: String,
}

impl CompletionRequest {
    /// Flattened in the order every chat endpoint expects.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.message.clone()));
        messages
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("transient generation failure: {0}")]
    Transient(String),
    #[error("permanent generation failure: {0}")]
    Permanent(String),
}

impl LlmError {
    /// Rate limiting and server-side errors may clear up; other rejections will not.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = format!("HTTP {status}: {}", body.trim());
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transient(_))
    }

    pub fn failure(&self) -> UpstreamFailure {
        if self.is_retryable() {
            UpstreamFailure::Transient
        } else {
            UpstreamFailure::Permanent
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() || error.is_builder() {
            Self::Permanent(error.to_string())
        } else {
            Self::Transient(error.to_string())
        }
    }
}

impl From<LlmError> for ApplicationError {
    fn from(error: LlmError) -> Self {
        ApplicationError::UpstreamUnavailable {
            failure: error.failure(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Builds the configured HTTP client. Per-attempt deadlines are enforced by
/// the generation guard, not here.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, ApplicationError> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
    let settings = GenerationSettings::from(config);

    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ApplicationError::Configuration("llm.api_key is required for openai".to_string())
            })?;
            Ok(Arc::new(OpenAiClient::new(http, config.base_url.as_deref(), api_key, settings)))
        }
        LlmProvider::Ollama => {
            Ok(Arc::new(OllamaClient::new(http, config.base_url.as_deref(), settings)))
        }
    }
}

/// Reply text from a parsed provider payload; blank output counts as malformed.
pub(crate) fn non_empty_reply(content: Option<String>) -> Result<String, LlmError> {
    content
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| LlmError::Permanent("provider returned an empty reply".to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;
    use secrecy::SecretString;

    use propbot_core::config::{AppConfig, LlmProvider};
    use propbot_core::errors::{ApplicationError, UpstreamFailure};

    use super::{build_client, ChatMessage, ChatRole, CompletionRequest, LlmError};

    #[test]
    fn status_codes_split_into_transient_and_permanent() {
        assert!(LlmError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_retryable());
        assert!(LlmError::from_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(LlmError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!LlmError::from_status(StatusCode::UNAUTHORIZED, "bad key").is_retryable());
        assert!(!LlmError::from_status(StatusCode::NOT_FOUND, "no model").is_retryable());
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn llm_errors_map_to_upstream_unavailable_with_failure_class() {
        let transient = ApplicationError::from(LlmError::Transient("503".to_string()));
        let permanent = ApplicationError::from(LlmError::Permanent("401".to_string()));

        assert!(matches!(
            transient,
            ApplicationError::UpstreamUnavailable { failure: UpstreamFailure::Transient, .. }
        ));
        assert!(matches!(
            permanent,
            ApplicationError::UpstreamUnavailable { failure: UpstreamFailure::Permanent, .. }
        ));
    }

    #[test]
    fn messages_are_system_then_history_then_user() {
        let request = CompletionRequest {
            system_prompt: "be brief".to_string(),
            history: vec![ChatMessage::user("hi"), ChatMessage {
                role: ChatRole::Assistant,
                content: "hello!".to_string(),
            }],
            message: "budget is 50 lakh".to_string(),
        };

        let roles: Vec<ChatRole> = request.messages().iter().map(|m| m.role).collect();

        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(request.messages()[3].content, "budget is 50 lakh");
    }

    #[test]
    fn chat_roles_serialize_lowercase() {
        let value = serde_json::to_value(ChatMessage::system("x")).expect("serialize");
        assert_eq!(value["role"], "system");
    }

    #[test]
    fn build_client_follows_provider() {
        let mut config = AppConfig::default().llm;
        let ollama = build_client(&config).expect("ollama client");
        assert_eq!(ollama.provider(), "ollama");

        config.provider = LlmProvider::OpenAi;
        assert!(matches!(build_client(&config), Err(ApplicationError::Configuration(_))));

        config.api_key = Some(SecretString::from("sk-test".to_string()));
        let openai = build_client(&config).expect("openai client");
        assert_eq!(openai.provider(), "openai");
    }
}
