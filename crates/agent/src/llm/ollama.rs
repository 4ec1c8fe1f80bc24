use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    non_empty_reply, ChatMessage, CompletionRequest, GenerationSettings, LlmClient, LlmError,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local Ollama `/api/chat` client, non-streaming.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    settings: GenerationSettings,
}

impl OllamaClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<&str>,
        settings: GenerationSettings,
    ) -> Self {
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string();
        Self { http, base_url, settings }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn body(&self, request: &CompletionRequest) -> OllamaChatBody<'_> {
        OllamaChatBody {
            model: &self.settings.model,
            messages: request.messages(),
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = self.http.post(self.chat_url()).json(&self.body(request)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &body));
        }

        let payload: OllamaChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Permanent(format!("malformed chat response: {error}")))?;
        non_empty_reply(payload.message.and_then(|message| message.content))
    }
}
