//! Multi-channel acquisition of JSON documents.
//!
//! The orchestrator tries each [`FetchChannel`] strictly in order, never in
//! parallel, short-circuiting on the first success. Parallel racing is
//! rejected on purpose: it would muddle attribution of which channel
//! produced the result and could issue redundant side-effecting requests
//! for non-idempotent methods. Per-channel failures are recorded as data
//! and aggregated; nothing below the orchestrator boundary throws past it.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::FetchError;
use crate::types::{ApiRequest, ChannelFailure, FetchChannel, FetchSuccess};

const DEFAULT_PUBLIC_RELAY: &str = "https://api.allorigins.win/get";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Full URL of the same-origin relay endpoint (`.../api/proxy`). When
    /// absent the Proxy channel records a failure and the fallback moves on.
    pub proxy_endpoint: Option<String>,
    /// Base URL of the public "fetch anything" relay. The target address is
    /// URL-encoded into its `url` query parameter.
    pub public_relay: String,
    /// Per-attempt client timeout.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            proxy_endpoint: None,
            public_relay: DEFAULT_PUBLIC_RELAY.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Sequential-fallback document fetcher.
pub struct FetchOrchestrator {
    client: Client,
    options: FetchOptions,
}

impl FetchOrchestrator {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, options })
    }

    /// Acquire a document, walking the channel order until one succeeds.
    ///
    /// On success the result carries the winning channel and the failures
    /// of the channels tried before it; on exhaustion the error carries all
    /// three failures in channel order.
    pub async fn fetch(&self, request: &ApiRequest) -> Result<FetchSuccess, FetchError> {
        // Malformed header JSON fails the whole attempt up-front with a
        // clear message rather than silently dropping headers.
        let headers = parse_header_json(request.headers.as_deref())?;

        let mut failures: Vec<ChannelFailure> = Vec::new();
        let mut channel = Some(FetchChannel::Direct);

        while let Some(current) = channel {
            match self.attempt(current, request, &headers).await {
                Ok(document) => {
                    info!(channel = %current, url = %request.url, "document acquired");
                    return Ok(FetchSuccess {
                        document,
                        channel: current,
                        failures,
                    });
                }
                Err(message) => {
                    warn!(channel = %current, %message, "channel failed, falling back");
                    failures.push(ChannelFailure {
                        channel: current,
                        message,
                    });
                }
            }
            channel = current.next();
        }

        Err(FetchError::Exhausted(failures))
    }

    async fn attempt(
        &self,
        channel: FetchChannel,
        request: &ApiRequest,
        headers: &Map<String, Value>,
    ) -> std::result::Result<Value, String> {
        match channel {
            FetchChannel::Direct => self.direct(request, headers).await,
            FetchChannel::Proxy => self.via_proxy(request).await,
            FetchChannel::PublicRelay => self.via_public_relay(request).await,
        }
    }

    /// Direct request to the target, `Content-Type: application/json`
    /// merged under any caller-supplied headers.
    async fn direct(
        &self,
        request: &ApiRequest,
        headers: &Map<String, Value>,
    ) -> std::result::Result<Value, String> {
        let method: Method = request
            .method
            .parse()
            .map_err(|_| format!("invalid HTTP method {:?}", request.method))?;

        let mut builder = self.client.request(method, &request.url);
        // The default content type sits under the caller's headers; a
        // caller-supplied Content-Type wins outright.
        let has_content_type = headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(name.as_str(), header_value(value));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| format!("transport error: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_status_message(status));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| format!("response was not JSON: {e}"))
    }

    /// Forward through the same-origin relay, which normalizes the target
    /// scheme, injects a browser User-Agent, bounds the upstream timeout,
    /// and passes through the upstream status and body.
    async fn via_proxy(&self, request: &ApiRequest) -> std::result::Result<Value, String> {
        let endpoint = self
            .options
            .proxy_endpoint
            .as_deref()
            .ok_or_else(|| "relay endpoint not configured".to_string())?;

        let envelope = json!({
            "targetUrl": request.url,
            "method": request.method,
            "headers": request.headers,
            "body": request.body,
        });

        let response = self
            .client
            .post(endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| format!("relay unreachable: {e}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("relay read error: {e}"))?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|_| format!("relay returned non-JSON ({})", status))?;

        if let Some(message) = relay_error_message(&body) {
            return Err(message);
        }
        if !status.is_success() {
            return Err(format!("upstream {}", http_status_message(status)));
        }
        debug!("proxy relay succeeded with status {status}");
        Ok(body)
    }

    /// GET-only public relay: the target is URL-encoded as a query
    /// parameter and the upstream body comes back as a string field of the
    /// relay envelope. Attempted regardless of the original method, but
    /// understood to be unreliable for non-GET semantics.
    async fn via_public_relay(&self, request: &ApiRequest) -> std::result::Result<Value, String> {
        let url = Url::parse_with_params(&self.options.public_relay, &[("url", &request.url)])
            .map_err(|e| format!("bad relay URL: {e}"))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("relay unreachable: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("relay {}", http_status_message(status)));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| format!("relay envelope was not JSON: {e}"))?;
        unwrap_public_relay_envelope(&envelope)
    }
}

/// Parse the user-supplied header JSON string into a map. Absent or blank
/// input is an empty map; anything unparsable or non-object is a
/// configuration error.
pub fn parse_header_json(raw: Option<&str>) -> Result<Map<String, Value>, FetchError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| FetchError::InvalidHeaders(e.to_string()))?;
    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(FetchError::InvalidHeaders(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Extract the raw upstream body from a public-relay envelope and parse it
/// as JSON.
pub fn unwrap_public_relay_envelope(envelope: &Value) -> std::result::Result<Value, String> {
    let contents = envelope
        .get("contents")
        .and_then(Value::as_str)
        .ok_or_else(|| "relay envelope missing 'contents'".to_string())?;
    serde_json::from_str(contents).map_err(|e| format!("relay contents were not JSON: {e}"))
}

/// Failure text for a same-origin relay error envelope, if it is one.
pub fn relay_error_message(body: &Value) -> Option<String> {
    let error = body.get("error").and_then(Value::as_str)?;
    match body.get("details").and_then(Value::as_str) {
        Some(details) => Some(format!("{error}: {details}")),
        None => Some(error.to_string()),
    }
}

fn http_status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

fn header_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
