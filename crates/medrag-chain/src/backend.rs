//! LLM Backend trait and implementations.
//!
//! This module defines the abstraction layer for model providers and
//! provides mock and logging implementations.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ChainError, Result};
use crate::types::{CompletionRequest, CompletionResponse, StopReason, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures). Non-retryable errors
/// are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) || attempt >= max_retries => return Err(e),
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    backend = backend_name,
                    attempt = attempt,
                    max_retries = max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

/// Check if an error is retryable.
///
/// Only network errors are considered retryable.
pub fn is_retryable(error: &ChainError) -> bool {
    matches!(error, ChainError::Network(_))
}

/// Trait for LLM backend providers.
#[async_trait]
pub trait LLMBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()>;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LLMBackend>;

/// A mock backend for testing purposes.
///
/// Returns pre-configured responses in order and records every request.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: Mutex<Vec<CompletionResponse>>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with the given responses.
    ///
    /// If more requests are made than responses available, an error is returned.
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend replying with each text in turn.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                CompletionResponse::new(
                    format!("mock_msg_{}", i + 1),
                    "mock-model",
                    text,
                    StopReason::EndTurn,
                    Usage::new(10, 20),
                )
            })
            .collect();
        Self::new(responses)
    }

    /// Create a mock backend with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_texts([text.into()])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().map(|log| log.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LLMBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log
            .lock()
            .map_err(|e| ChainError::Internal(format!("MockBackend lock poisoned: {}", e)))?
            .push(request);

        let mut responses = self
            .responses
            .lock()
            .map_err(|e| ChainError::Internal(format!("MockBackend lock poisoned: {}", e)))?;
        if responses.is_empty() {
            return Err(ChainError::Backend(
                "MockBackend: no more responses available".to_string(),
            ));
        }
        Ok(responses.remove(0))
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A backend that wraps another backend with request/response logging.
pub struct LoggingBackend<B: LLMBackend> {
    inner: B,
    name: String,
}

impl<B: LLMBackend> LoggingBackend<B> {
    /// Create a new logging backend.
    pub fn new(inner: B) -> Self {
        let name = format!("logging({})", inner.name());
        Self { inner, name }
    }
}

#[async_trait]
impl<B: LLMBackend> LLMBackend for LoggingBackend<B> {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            backend = self.inner.name(),
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(
                    backend = self.inner.name(),
                    response_id = %response.id,
                    stop_reason = ?response.stop_reason,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    duration_ms = elapsed.as_millis() as u64,
                    "Completion successful"
                );
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.inner.name(),
                    error = %e,
                    duration_ms = elapsed.as_millis() as u64,
                    "Completion failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
