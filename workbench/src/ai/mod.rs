//! Schema/filter-inference collaborator boundary.
//!
//! The collaborator is stateless request/response: nothing is carried
//! server-side between calls, and the pipeline stays fully usable when it
//! is absent or always failing. [`AnalysisService`] is the seam (so tests
//! can stub it); [`GeminiClient`] is the production implementation;
//! [`SchemaInference`] is the soft boundary that converts every failure
//! into a neutral result before it crosses into the session.

mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::types::{ChatReply, EndpointCandidate, SchemaInferenceResult};

pub use gemini::GeminiClient;

/// AI service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key for the AI service.
    pub api_key: String,
    /// Model name/version to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: "gemini-2.5-flash".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl AiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_seconds: 30,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication error: missing or invalid API key")]
    AuthenticationError,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// The three independent request/response operations against the analysis
/// collaborator.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Propose a transformation configuration for a document sample.
    async fn analyze(&self, sample: &Value) -> AiResult<SchemaInferenceResult>;

    /// One conversational turn over the current document sample. No memory
    /// is carried between calls.
    async fn chat(&self, query: &str, sample: &Value) -> AiResult<ChatReply>;

    /// High-recall extraction of endpoint candidates from pasted text.
    async fn scan(&self, input_text: &str) -> AiResult<Vec<EndpointCandidate>>;
}

/// Soft boundary over an [`AnalysisService`]: every operation tolerates
/// total failure by returning a neutral result, so the UI always remains
/// usable with the last good configuration.
pub struct SchemaInference<S: AnalysisService> {
    inner: S,
}

impl<S: AnalysisService> SchemaInference<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Infer a configuration. On failure the result's path/key fields are
    /// empty and `reasoning` carries the error text; the caller leaves the
    /// existing configuration untouched. Never retried automatically.
    pub async fn infer_schema(&self, sample: &Value) -> SchemaInferenceResult {
        match self.inner.analyze(sample).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, "schema analysis failed");
                SchemaInferenceResult {
                    reasoning: format!("Analysis failed: {err}"),
                    ..SchemaInferenceResult::default()
                }
            }
        }
    }

    /// One conversational turn. On failure the reply carries the error text
    /// and there are no side effects.
    pub async fn converse(&self, query: &str, sample: &Value) -> ChatReply {
        match self.inner.chat(query, sample).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, "chat turn failed");
                ChatReply {
                    reply: format!("Sorry, I couldn't analyze the data: {err}"),
                    ..ChatReply::default()
                }
            }
        }
    }

    /// Endpoint discovery; failure is an empty candidate list.
    pub async fn discover_endpoints(&self, input_text: &str) -> Vec<EndpointCandidate> {
        match self.inner.scan(input_text).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(%err, "endpoint scan failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingService;

    #[async_trait]
    impl AnalysisService for FailingService {
        async fn analyze(&self, _sample: &Value) -> AiResult<SchemaInferenceResult> {
            Err(AiError::ApiError("quota exceeded".to_string()))
        }
        async fn chat(&self, _query: &str, _sample: &Value) -> AiResult<ChatReply> {
            Err(AiError::AuthenticationError)
        }
        async fn scan(&self, _input: &str) -> AiResult<Vec<EndpointCandidate>> {
            Err(AiError::InvalidResponse("not JSON".to_string()))
        }
    }

    #[tokio::test]
    async fn failures_become_neutral_results() {
        let boundary = SchemaInference::new(FailingService);

        let inference = boundary.infer_schema(&json!({"a": 1})).await;
        assert!(!inference.has_proposal());
        assert!(inference.reasoning.contains("quota exceeded"));

        let reply = boundary.converse("show all", &json!([])).await;
        assert!(reply.filter_code.is_none());
        assert!(reply.suggested_config.is_none());
        assert!(!reply.reply.is_empty());

        assert!(boundary.discover_endpoints("fetch('/api')").await.is_empty());
    }
}
