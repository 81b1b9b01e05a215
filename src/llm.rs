//! Client for the external chat-completion service.
//!
//! The gateway only needs "prompt in, text out", so the wire format of the
//! OpenAI-compatible API stays private to this module.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ModelError {
    /// Network failure or timeout before a response arrived
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model rejected credentials ({status}): {body}")]
    Unauthorized { status: u16, body: String },
    #[error("model quota exceeded ({status}): {body}")]
    QuotaExceeded { status: u16, body: String },
    #[error("model API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// A text-completion service: one prompt in, one completion out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    fn model_id(&self) -> &str;
}

/// OpenAI `/chat/completions` backend.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        client: Client,
        api_key: String,
        base_url: &str,
        model_id: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id,
            temperature,
        }
    }

    fn classify(status: StatusCode, body: String) -> ModelError {
        let status_code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Unauthorized {
                status: status_code,
                body,
            },
            StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => {
                ModelError::QuotaExceeded {
                    status: status_code,
                    body,
                }
            }
            _ => ModelError::Api {
                status: status_code,
                body,
            },
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(model_id = %self.model_id, prompt_len = prompt.len(), "requesting completion");

        let body = ChatRequest {
            model: &self.model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "completion request failed");
                ModelError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %text, "completion API returned error status");
            return Err(Self::classify(status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::MalformedResponse("no content in response".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}
