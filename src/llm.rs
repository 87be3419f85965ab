//! Generation service client.
//!
//! The pipeline treats text generation as an opaque async service behind
//! the [`GenerationService`] trait. The shipped implementation talks to
//! OpenAI-compatible chat-completions endpoints; tests inject mocks.

use crate::constants::{DEFAULT_MAX_COMPLETION_TOKENS, DEFAULT_TEMPERATURE};
use crate::error::GuardError;
use async_trait::async_trait;
use serde_json::json;
use std::str::FromStr;
use tracing::{debug, warn};

/// An opaque text-generation service.
///
/// One attempt per call; no internal retry or timeout. A slow or failing
/// provider propagates directly to the caller.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate a completion for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String, GuardError>;

    /// Best-effort credential probe. Failures of the probe itself are
    /// swallowed into `false`.
    async fn validate_credentials(&self) -> bool;
}

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
    Ollama,
}

impl Provider {
    /// Default endpoint for the provider's OpenAI-compatible API.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Whether the provider needs an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::Ollama => "ollama",
        }
    }
}

impl FromStr for Provider {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            "ollama" => Ok(Provider::Ollama),
            other => Err(GuardError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// HTTP client for OpenAI-compatible chat-completions endpoints.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    /// Create a client for the given provider.
    pub fn new(provider: Provider, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_string(),
            model: model.into(),
        }
    }

    /// Override the endpoint base URL (self-hosted gateways, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the chat-completions request body.
    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a database query generator. \
                                Return exactly what is asked for, nothing else."
                },
                {"role": "user", "content": prompt}
            ],
            "temperature": DEFAULT_TEMPERATURE,
        });

        // Newer reasoning models only accept max_completion_tokens.
        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = json!(DEFAULT_MAX_COMPLETION_TOKENS);
        } else {
            body["max_tokens"] = json!(DEFAULT_MAX_COMPLETION_TOKENS);
        }

        body
    }
}

#[async_trait]
impl GenerationService for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, GuardError> {
        debug!(
            model = %self.model,
            prompt_bytes = prompt.len(),
            "calling generation service"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GuardError::generation(format!(
                "provider returned {}: {}",
                status, error_text
            )));
        }

        let payload: serde_json::Value = response.json().await?;

        if let Some(error) = payload.get("error") {
            return Err(GuardError::generation(format!(
                "provider error: {}",
                error
            )));
        }

        let choice = payload
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| GuardError::generation("no choices in provider response"))?;

        if let Some(reason) = choice.get("finish_reason").and_then(|r| r.as_str()) {
            if reason == "content_filter" {
                return Err(GuardError::generation(
                    "completion was blocked by the provider's content filter",
                ));
            }
            if reason == "length" {
                warn!("completion was truncated by the provider's token limit");
            }
        }

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| GuardError::generation("no content in provider response"))?;

        if content.trim().is_empty() {
            return Err(GuardError::generation("empty content in provider response"));
        }

        Ok(content.to_string())
    }

    async fn validate_credentials(&self) -> bool {
        let probe = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await;

        match probe {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("credential probe failed: {}", e);
                false
            }
        }
    }
}
