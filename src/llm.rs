//! Chat-completion client for an OpenAI-compatible backend.
//!
//! Both the emotion classifier and the chat responder go through the
//! [`ChatModel`] trait so tests can substitute a scripted model.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RateLimitInfo;

const USER_AGENT: &str = concat!("moodmap/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("rate limited by model backend")]
    RateLimited(RateLimitInfo),
    #[error("model backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model returned no content")]
    EmptyContent,
}

/// Parameters for one completion call.
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Minimal seam over a chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Issue a single system+user completion and return the text content.
    async fn chat(&self, system: &str, user: &str, params: ChatParams)
        -> Result<String, LlmError>;

    /// Whether a credential is configured at all.
    fn is_configured(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

/// HTTP client for `/v1/chat/completions`.
#[derive(Clone)]
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpChatModel {
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn chat(
        &self,
        system: &str,
        user: &str,
        params: ChatParams,
    ) -> Result<String, LlmError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmError::MissingCredential);
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: system,
                },
                WireMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let info = rate_limit_info(&response);
            return Err(LlmError::RateLimited(info));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::model::truncate_chars(&body, 200),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Pull reset/remaining metadata out of a 429 response's headers.
fn rate_limit_info(response: &reqwest::Response) -> RateLimitInfo {
    let header_u64 = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    };

    RateLimitInfo {
        retry_after_secs: header_u64("retry-after").or_else(|| header_u64("x-ratelimit-reset")),
        remaining: header_u64("x-ratelimit-remaining"),
        source: "llm".to_string(),
    }
}
