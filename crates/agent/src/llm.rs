use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sizequote_core::config::{LlmConfig, LlmProvider};
use tracing::debug;

use crate::extraction::ExtractionError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one system instruction plus the user's text and returns the raw reply.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractionError>;
}

pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, ExtractionError> {
    let http = http_client(config.timeout_secs)?;
    let base_url = config.effective_base_url();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi | LlmProvider::Ollama => Arc::new(ChatCompletionsClient {
            http,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }),
        LlmProvider::Anthropic => Arc::new(AnthropicClient {
            http,
            base_url,
            api_key: config.api_key.clone().unwrap_or_else(|| SecretString::from(String::new())),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }),
    };
    Ok(client)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ExtractionError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| ExtractionError::Transport(error.to_string()))
}

/// OpenAI-compatible `/chat/completions` endpoint; Ollama speaks the same dialect.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: self.max_tokens,
        };

        let mut builder =
            self.http.post(format!("{}/chat/completions", self.base_url)).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        debug!(event_name = "llm.request.sent", model = %self.model, "sending chat completion");
        let body = send(builder).await?;

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|error| ExtractionError::MalformedCompletion(error.to_string()))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                ExtractionError::MalformedCompletion("no choices in response".to_string())
            })?
            .message
            .content
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens,
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractionError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![ChatMessage { role: "user", content: user }],
        };

        let builder = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);

        debug!(event_name = "llm.request.sent", model = %self.model, "sending messages request");
        let body = send(builder).await?;

        let response: Value = serde_json::from_str(&body)
            .map_err(|error| ExtractionError::MalformedCompletion(error.to_string()))?;
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExtractionError::MalformedCompletion("missing content blocks".to_string())
            })?;

        let text = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");

        Ok(text.trim().to_string())
    }
}

async fn send(builder: reqwest::RequestBuilder) -> Result<String, ExtractionError> {
    let response =
        builder.send().await.map_err(|error| ExtractionError::Transport(error.to_string()))?;
    let status = response.status();
    let body =
        response.text().await.map_err(|error| ExtractionError::Transport(error.to_string()))?;

    if !status.is_success() {
        return Err(ExtractionError::UnexpectedStatus { status: status.as_u16(), body });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{AnthropicClient, ChatCompletionsClient, LlmClient};
    use crate::extraction::ExtractionError;

    #[tokio::test]
    async fn chat_completions_sends_system_and_user_messages() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body(json!({
                        "model": "gpt-4-turbo",
                        "max_tokens": 1000,
                        "messages": [
                            {"role": "system", "content": "extract"},
                            {"role": "user", "content": "screen 3500"}
                        ]
                    }));
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "  [{\"produkt\": \"screen\"}]\n"}}]
                }));
            })
            .await;

        let client = ChatCompletionsClient::new(
            server.base_url(),
            Some(SecretString::from("sk-test".to_string())),
            "gpt-4-turbo",
            1000,
            5,
        )
        .expect("client builds");

        let reply = client.complete("extract", "screen 3500").await.expect("completion");

        mock.assert_async().await;
        assert_eq!(reply, "[{\"produkt\": \"screen\"}]");
    }

    #[tokio::test]
    async fn chat_completions_reports_http_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).body("invalid api key");
            })
            .await;

        let client = ChatCompletionsClient::new(server.base_url(), None, "gpt-4-turbo", 1000, 5)
            .expect("client builds");

        let error = client.complete("extract", "text").await.expect_err("401 fails");
        assert_eq!(
            error,
            ExtractionError::UnexpectedStatus { status: 401, body: "invalid api key".to_string() }
        );
    }

    #[tokio::test]
    async fn chat_completions_without_choices_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let client = ChatCompletionsClient::new(server.base_url(), None, "llama3", 1000, 5)
            .expect("client builds");

        let error = client.complete("extract", "text").await.expect_err("no choices");
        assert!(matches!(error, ExtractionError::MalformedCompletion(_)));
    }

    #[tokio::test]
    async fn anthropic_joins_text_blocks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/messages")
                    .header("x-api-key", "anthropic-key")
                    .header("anthropic-version", "2023-06-01");
                then.status(200).json_body(json!({
                    "content": [
                        {"type": "text", "text": "Here you go: "},
                        {"type": "text", "text": "[{\"nenalezeno\": true}]"}
                    ]
                }));
            })
            .await;

        let client = AnthropicClient::new(
            server.base_url(),
            SecretString::from("anthropic-key".to_string()),
            "claude-3-5-sonnet-latest",
            1000,
            5,
        )
        .expect("client builds");

        let reply = client.complete("extract", "text").await.expect("completion");

        mock.assert_async().await;
        assert_eq!(reply, "Here you go: [{\"nenalezeno\": true}]");
    }
}
