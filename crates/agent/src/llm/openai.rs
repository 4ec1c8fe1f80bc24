use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    non_empty_reply, ChatMessage, CompletionRequest, GenerationSettings, LlmClient, LlmError,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    settings: GenerationSettings,
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<&str>,
        api_key: SecretString,
        settings: GenerationSettings,
    ) -> Self {
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string();
        Self { http, base_url, api_key, settings }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn body(&self, request: &CompletionRequest) -> ChatCompletionBody<'_> {
        ChatCompletionBody {
            model: &self.settings.model,
            messages: request.messages(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_reply(self) -> Result<String, LlmError> {
        non_empty_reply(self.choices.into_iter().next().and_then(|choice| choice.message.content))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.chat_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &body));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Permanent(format!("malformed completion: {error}")))?;
        payload.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::{ChatCompletionResponse, OpenAiClient};
    use crate::llm::{ChatMessage, CompletionRequest, GenerationSettings, LlmError};

    fn client(base_url: Option<&str>) -> OpenAiClient {
        OpenAiClient::new(
            reqwest::Client::new(),
            base_url,
            SecretString::from("sk-test".to_string()),
            GenerationSettings {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: 200,
            },
        )
    }

    #[test]
    fn chat_url_defaults_to_public_endpoint_and_trims_slash() {
        assert_eq!(client(None).chat_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            client(Some("http://gateway.local/v1/")).chat_url(),
            "http://gateway.local/v1/chat/completions"
        );
    }

    #[test]
    fn body_carries_generation_settings_and_messages() {
        let request = CompletionRequest {
            system_prompt: "You are PropBot".to_string(),
            history: vec![ChatMessage::user("hello")],
            message: "2 BHK please".to_string(),
        };
        let client = client(None);

        let body = serde_json::to_value(client.body(&request)).expect("serialize body");

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], "2 BHK please");
    }

    #[test]
    fn first_choice_is_the_reply() {
        let payload: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Happy to help!  " } }]
        }))
        .expect("parse");

        assert_eq!(payload.into_reply(), Ok("Happy to help!".to_string()));
    }

    #[test]
    fn missing_choices_are_permanent_failures() {
        let payload: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [] })).expect("parse");

        assert!(matches!(payload.into_reply(), Err(LlmError::Permanent(_))));
    }
}
