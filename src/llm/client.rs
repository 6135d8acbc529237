//! Model client for OpenAI-compatible chat servers.
//!
//! The pipeline only depends on the `ModelClient` trait; the concrete
//! client talks to any server exposing `/chat/completions` and `/models`
//! (LM Studio, llama.cpp server, vLLM and friends).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Cannot connect to model server at {0}")]
    Connection(String),

    #[error("Model server error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// Per-request generation settings.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Raw text plus usage metadata returned by the model.
#[derive(Debug, Clone)]
pub struct Generation {
    pub content: String,
    pub model: String,
    pub usage: Option<Value>,
}

/// The contract the pipeline consumes.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a prompt and return the raw completion text.
    async fn generate(&self, prompt: &str, options: &GenerateOptions)
        -> Result<Generation, LlmError>;

    /// Ids of the models the server can serve.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

/// Connection settings for `OpenAiCompatibleClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:1234/v1".to_string(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that analyzes system state data and answers only with JSON.";

/// Client for OpenAI-compatible servers.
pub struct OpenAiCompatibleClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: ClientConfig) -> Result<Self, LlmError> {
        info!("Initializing model client for {}", config.server_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Connection(format!("{}: {}", config.server_url, e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.server_url.trim_end_matches('/'), path)
    }

    fn send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else if e.is_connect() {
            LlmError::Connection(self.config.server_url.clone())
        } else {
            LlmError::InvalidResponse(format!("Failed to send request: {}", e))
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Api { status, body })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let url = self.endpoint("chat/completions");

        let request = ChatRequest {
            model: options.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        debug!(
            "Sending {} prompt chars to {} (model {})",
            prompt.len(),
            url,
            options.model
        );
        let started = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let response = Self::check_status(response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        debug!(
            "Model answered with {} chars in {}ms",
            content.len(),
            started.elapsed().as_millis()
        );

        Ok(Generation {
            content,
            model: chat.model.unwrap_or_else(|| options.model.clone()),
            usage: chat.usage,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = self.endpoint("models");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let response = Self::check_status(response).await?;

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_client(server: &MockServer, timeout_seconds: u64) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new(ClientConfig {
            server_url: format!("{}/v1", server.uri()),
            timeout_seconds,
        })
        .unwrap()
    }

    fn options() -> GenerateOptions {
        GenerateOptions {
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: Some(256),
        }
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "test-model", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "test-model",
                "choices": [{"message": {"role": "assistant", "content": "{\"severity\": \"low\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
            })))
            .mount(&server)
            .await;

        let client = create_client(&server, 10);
        let generation = client.generate("analyze", &options()).await.unwrap();

        assert_eq!(generation.content, "{\"severity\": \"low\"}");
        assert_eq!(generation.model, "test-model");
        assert_eq!(generation.usage.unwrap()["total_tokens"], 17);
    }

    #[tokio::test]
    async fn test_generate_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let client = create_client(&server, 10);
        let err = client.generate("analyze", &options()).await.unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 500, ref body } if body == "model crashed"));
    }

    #[tokio::test]
    async fn test_generate_without_choices_is_invalid() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = create_client(&server, 10);
        let err = client.generate("analyze", &options()).await.unwrap_err();

        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = create_client(&server, 1);
        let err = client.generate("analyze", &options()).await.unwrap_err();

        assert!(matches!(err, LlmError::Timeout { seconds: 1 }));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"id": "gemma-2-9b-it"}, {"id": "qwen2.5-7b"}]
            })))
            .mount(&server)
            .await;

        let client = create_client(&server, 10);
        let models = client.list_models().await.unwrap();

        assert_eq!(models, vec!["gemma-2-9b-it", "qwen2.5-7b"]);
    }
}
