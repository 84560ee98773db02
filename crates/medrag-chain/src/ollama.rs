//! Ollama API backend implementation.
//!
//! This module provides the `OllamaBackend` which connects to Ollama's
//! OpenAI-compatible API for local LLM inference.

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::Duration;

use crate::backend::{LLMBackend, with_retry};
use crate::error::{ChainError, Result};
use crate::types::{CompletionRequest, CompletionResponse, Role, StopReason, Usage};

/// Default Ollama API base URL.
pub const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";

/// Default timeout for requests (longer for local inference).
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default model for Ollama backend.
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Model to use for completions (overrides request model).
    pub model: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl OllamaConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Ollama API backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChainError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Convert our CompletionRequest to Ollama's OpenAI-compatible format.
    fn to_ollama_request(&self, request: &CompletionRequest) -> OllamaChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }

        for m in &request.messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(OllamaMessage {
                role: role.to_string(),
                content: Some(m.content.clone()),
            });
        }

        OllamaChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stream: Some(false),
        }
    }

    /// Parse Ollama response into our format.
    fn parse_response(&self, response: OllamaChatResponse) -> CompletionResponse {
        let (text, stop_reason) = match response.choices.into_iter().next() {
            Some(c) => {
                let stop_reason = match c.finish_reason.as_deref() {
                    Some("length") => StopReason::MaxTokens,
                    _ => StopReason::EndTurn,
                };
                (c.message.content.unwrap_or_default(), stop_reason)
            }
            None => (String::new(), StopReason::EndTurn),
        };

        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        CompletionResponse {
            id: response.id,
            model: response.model,
            text,
            stop_reason: Some(stop_reason),
            usage,
        }
    }

    /// Make a non-streaming request.
    async fn send_request(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let ollama_request = self.to_ollama_request(request);
        let url = self.completions_url();

        tracing::debug!(
            model = %self.config.model,
            messages = ollama_request.messages.len(),
            "Ollama request"
        );

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| ChainError::Network(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Backend(format!(
                "Ollama API error ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Serialization(format!("Failed to parse response: {}", e)))?;

        Ok(self.parse_response(ollama_response))
    }
}

#[async_trait]
impl LLMBackend for OllamaBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "ollama",
            || self.send_request(&request),
        )
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!(
            "{}/models",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::Network(format!("Ollama health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChainError::Backend(format!(
                "Ollama health check returned {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama API Types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<OllamaChoice>,
    usage: Option<OllamaUsage>,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaChoice {
    message: OllamaMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
