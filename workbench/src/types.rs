//! Shared data model for the acquisition and transformation pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Description of an HTTP request to acquire a document from a target API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Target endpoint URL.
    pub url: String,
    /// HTTP method name ("GET", "POST", ...).
    pub method: String,
    /// Extra headers as a JSON-encoded object string, as entered by the user.
    /// Malformed JSON here fails the fetch attempt up-front.
    pub headers: Option<String>,
    /// Optional JSON request body, forwarded for POST/PUT-style methods.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: None,
            body: None,
        }
    }
}

/// One of the three acquisition strategies, tried strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchChannel {
    /// Direct request to the target endpoint.
    Direct,
    /// Same-origin relay endpoint (`POST /api/proxy`).
    Proxy,
    /// Third-party "fetch anything" relay, GET-only.
    PublicRelay,
}

impl FetchChannel {
    /// The fallback order. The orchestrator walks this list front to back.
    pub const ORDER: [FetchChannel; 3] =
        [FetchChannel::Direct, FetchChannel::Proxy, FetchChannel::PublicRelay];

    /// Next channel to try after this one fails, if any.
    pub fn next(self) -> Option<FetchChannel> {
        match self {
            FetchChannel::Direct => Some(FetchChannel::Proxy),
            FetchChannel::Proxy => Some(FetchChannel::PublicRelay),
            FetchChannel::PublicRelay => None,
        }
    }
}

impl fmt::Display for FetchChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchChannel::Direct => "Direct",
            FetchChannel::Proxy => "Proxy",
            FetchChannel::PublicRelay => "PublicRelay",
        };
        f.write_str(name)
    }
}

/// A recorded per-channel acquisition failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelFailure {
    pub channel: FetchChannel,
    pub message: String,
}

/// Outcome of a successful acquisition: the document, the channel that
/// produced it, and the failures of the channels tried before it. The
/// channel tag is observability only and has no downstream effect.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub document: Value,
    pub channel: FetchChannel,
    pub failures: Vec<ChannelFailure>,
}

/// Where the item collection lives inside a document and which item fields
/// become the label/value pair. Replaced wholesale on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationConfig {
    /// Dot-delimited path to the collection; empty addresses the document itself.
    pub root_path: String,
    pub label_key: String,
    pub value_key: String,
}

impl TransformationConfig {
    pub fn new(
        root_path: impl Into<String>,
        label_key: impl Into<String>,
        value_key: impl Into<String>,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            label_key: label_key.into(),
            value_key: value_key.into(),
        }
    }
}

/// One exported label/value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub label: Value,
    pub value: Value,
}

/// Proposed transformation configuration from the analysis collaborator,
/// plus its free-text justification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaInferenceResult {
    pub root_path: String,
    pub label_key: String,
    pub value_key: String,
    pub reasoning: String,
}

impl SchemaInferenceResult {
    /// Whether the collaborator actually proposed a usable configuration.
    pub fn has_proposal(&self) -> bool {
        !self.label_key.is_empty() || !self.value_key.is_empty() || !self.root_path.is_empty()
    }

    pub fn config(&self) -> TransformationConfig {
        TransformationConfig::new(&self.root_path, &self.label_key, &self.value_key)
    }
}

/// One conversational reply from the analysis collaborator. A returned
/// filter replaces the session's active predicate; a returned config
/// wholesale-replaces the session's transformation config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatReply {
    pub reply: String,
    pub filter_code: Option<String>,
    pub suggested_config: Option<TransformationConfig>,
}

/// Collaborator confidence for a discovered endpoint candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A candidate endpoint extracted from pasted source/log text. High recall,
/// never verified; used only to pre-fill the fetch form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub url: String,
    pub method: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One completed conversational turn, recorded in the session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub reply: String,
    pub applied_predicate: Option<String>,
    pub applied_config: Option<TransformationConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_order_is_sequential() {
        assert_eq!(FetchChannel::Direct.next(), Some(FetchChannel::Proxy));
        assert_eq!(FetchChannel::Proxy.next(), Some(FetchChannel::PublicRelay));
        assert_eq!(FetchChannel::PublicRelay.next(), None);
        assert_eq!(FetchChannel::ORDER.len(), 3);
    }

    #[test]
    fn inference_result_tolerates_missing_fields() {
        let result: SchemaInferenceResult =
            serde_json::from_str(r#"{"rootPath":"data.list","reasoning":"looks tabular"}"#)
                .expect("partial result should deserialize");
        assert_eq!(result.root_path, "data.list");
        assert!(result.label_key.is_empty());
        assert!(result.has_proposal());
    }

    #[test]
    fn empty_inference_result_is_not_a_proposal() {
        assert!(!SchemaInferenceResult::default().has_proposal());
    }
}
