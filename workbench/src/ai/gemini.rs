//! Google Gemini API client implementation.
//!
//! Implements the three collaborator operations (analyze, chat, scan) over
//! the `generateContent` endpoint, requesting structured JSON output with a
//! response schema for each.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::{AiConfig, AiError, AiResult, AnalysisService};
use crate::types::{ChatReply, EndpointCandidate, SchemaInferenceResult};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// Sample truncation budgets, per operation.
const ANALYZE_SAMPLE_CHARS: usize = 5000;
const CHAT_SAMPLE_CHARS: usize = 3000;
const SCAN_TEXT_CHARS: usize = 10000;

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: AiConfig,
    client: Client,
    base_url: String,
}

/// Gemini API request format
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

/// Gemini API response format
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(config: AiConfig) -> AiResult<Self> {
        if config.api_key.is_empty() {
            return Err(AiError::AuthenticationError);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            client,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    fn build_analyze_prompt(sample: &Value) -> String {
        format!(
            r#"I have a JSON response from an API. I want to convert this data into a "Dropdown" list for a website (Label/Value pairs).
Analyze the JSON structure.
1. Identify the path to the main array of data (e.g., "", "data", "response.list").
2. Suggest the best key to use as the "Label" (human readable text, like name, title).
3. Suggest the best key to use as the "Value" (unique identifier, like id, code, slug).

Here is a sample of the data (truncated):
{}"#,
            truncated_json(sample, ANALYZE_SAMPLE_CHARS)
        )
    }

    fn build_chat_prompt(query: &str, sample: &Value) -> String {
        format!(
            r#"You are a Data Assistant. The user is asking about this JSON data:
{}

User Query: "{}"

1. Answer the user's question naturally.
2. If the user asks to "Show", "Filter", or "Find" specific items, generate a filter string of the form "item => <boolean expression>" over a single 'item'. Use only member access on item, the comparison operators ===, !==, ==, !=, >, >=, <, <=, the boolean operators &&, || and !, and the string methods includes/startsWith/endsWith. Example: "item => item.district === 'Dhaka'".
3. If the user asks to "Select" or "Use" specific keys for the dropdown, suggest a new transformation config (rootPath, labelKey, valueKey)."#,
            truncated_json(sample, CHAT_SAMPLE_CHARS),
            query
        )
    }

    fn build_scan_prompt(input_text: &str) -> String {
        format!(
            r#"Analyze the following text (which could be source code, a curl command, or network logs) and extract potential API endpoints. Guess the method (GET/POST) based on context.
Text: {}
Return a list of found APIs."#,
            truncate(input_text, SCAN_TEXT_CHARS)
        )
    }

    fn analyze_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "rootPath": { "type": "STRING" },
                "labelKey": { "type": "STRING" },
                "valueKey": { "type": "STRING" },
                "reasoning": { "type": "STRING" }
            }
        })
    }

    fn chat_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "reply": { "type": "STRING" },
                "filterCode": { "type": "STRING", "nullable": true },
                "suggestedConfig": {
                    "type": "OBJECT",
                    "nullable": true,
                    "properties": {
                        "rootPath": { "type": "STRING" },
                        "labelKey": { "type": "STRING" },
                        "valueKey": { "type": "STRING" }
                    }
                }
            }
        })
    }

    fn scan_schema() -> Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "url": { "type": "STRING" },
                    "method": { "type": "STRING" },
                    "confidence": { "type": "STRING", "enum": ["high", "medium", "low"] },
                    "description": { "type": "STRING" }
                }
            }
        })
    }

    /// Send a structured-output request to the Gemini API and return the
    /// raw response text of the first candidate.
    async fn send_request(&self, prompt: String, response_schema: Value) -> AiResult<String> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema,
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        debug!(
            "Sending request to Gemini API: {}",
            url.replace(&self.config.api_key, "***")
        );

        let response = self.client.post(&url).json(&request_body).send().await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Gemini API response status: {}", status);

        if !status.is_success() {
            error!("Gemini API error: {} - {}", status, response_text);
            return Err(AiError::ApiError(format!("HTTP {status}: {response_text}")));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&response_text)?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or_else(|| AiError::InvalidResponse("no candidates in response".to_string()))?;

        if let Some(usage) = &gemini_response.usage_metadata {
            info!("Gemini API usage - total: {:?} tokens", usage.total_token_count);
        }

        Ok(text)
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    async fn analyze(&self, sample: &Value) -> AiResult<SchemaInferenceResult> {
        info!("Requesting schema analysis");
        let raw = self
            .send_request(Self::build_analyze_prompt(sample), Self::analyze_schema())
            .await?;
        let result: SchemaInferenceResult = serde_json::from_str(&raw)?;
        info!(root_path = %result.root_path, "schema analysis completed");
        Ok(result)
    }

    async fn chat(&self, query: &str, sample: &Value) -> AiResult<ChatReply> {
        info!("Requesting chat turn");
        let raw = self
            .send_request(Self::build_chat_prompt(query, sample), Self::chat_schema())
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn scan(&self, input_text: &str) -> AiResult<Vec<EndpointCandidate>> {
        info!("Requesting endpoint scan");
        let raw = self
            .send_request(Self::build_scan_prompt(input_text), Self::scan_schema())
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Truncate a JSON sample to a character budget for prompting.
fn truncated_json(sample: &Value, max_chars: usize) -> String {
    truncate(&sample.to_string(), max_chars).to_string()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_an_authentication_error() {
        let result = GeminiClient::new(AiConfig::new("", "gemini-2.5-flash"));
        assert!(matches!(result, Err(AiError::AuthenticationError)));
    }

    #[test]
    fn prompts_truncate_oversized_samples() {
        let sample = json!({"blob": "x".repeat(20_000)});
        let prompt = GeminiClient::build_analyze_prompt(&sample);
        assert!(prompt.len() < ANALYZE_SAMPLE_CHARS + 1000);
    }

    #[test]
    fn chat_reply_deserializes_with_optional_fields() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"reply":"Filtered to Dhaka.","filterCode":"item => item.district === 'Dhaka'"}"#,
        )
        .unwrap();
        assert!(reply.filter_code.is_some());
        assert!(reply.suggested_config.is_none());
    }

    #[test]
    fn scan_results_deserialize() {
        let raw = r#"[{"url":"https://api.example.com/v1/users","method":"GET","confidence":"high"}]"#;
        let candidates: Vec<EndpointCandidate> = serde_json::from_str(raw).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].confidence, crate::types::Confidence::High);
    }
}
