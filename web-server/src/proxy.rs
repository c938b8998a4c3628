//! The `/api/proxy` relay handler.
//!
//! Forwards a caller-described request to an arbitrary upstream: normalizes
//! the target scheme, injects a browser User-Agent when the caller did not
//! supply one, bounds the upstream timeout, and passes through the upstream
//! status with either the parsed JSON body or a raw-text envelope so the
//! caller never has to branch on content type.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest {
    target_url: String,
    #[serde(default)]
    method: Option<String>,
    /// Extra headers as a JSON-encoded object string.
    #[serde(default)]
    headers: Option<String>,
    #[serde(default)]
    body: Option<Value>,
}

pub(crate) async fn handle(State(state): State<AppState>, raw_body: Bytes) -> Response {
    // Browser visit / health check: no body means an informational envelope,
    // not an error.
    if raw_body.iter().all(|b| b.is_ascii_whitespace()) {
        return (
            StatusCode::OK,
            Json(json!({
                "status": "Running",
                "message": "Proxy server is active. Please send a POST request with 'targetUrl'."
            })),
        )
            .into_response();
    }

    let request: ProxyRequest = match serde_json::from_slice(&raw_body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                &err.to_string(),
            )
        }
    };

    if request.target_url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Target URL is required inside request body."})),
        )
            .into_response();
    }

    let final_url = normalize_target_url(&request.target_url);

    let headers = match parse_headers(request.headers.as_deref()) {
        Ok(headers) => headers,
        Err(details) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Proxy Internal Error", &details)
        }
    };

    let method = request.method.as_deref().unwrap_or("GET").to_uppercase();
    let reqwest_method = match method.parse::<reqwest::Method>() {
        Ok(m) => m,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                &format!("unsupported method {method:?}"),
            )
        }
    };

    let mut builder = state.client.request(reqwest_method, &final_url);
    let mut has_user_agent = false;
    for (name, value) in &headers {
        if name.eq_ignore_ascii_case("user-agent") {
            has_user_agent = true;
        }
        builder = builder.header(name.as_str(), header_value(value));
    }
    // Browser agent fix, to keep upstreams from blocking the relay outright.
    if !has_user_agent {
        builder = builder.header(reqwest::header::USER_AGENT, DEFAULT_USER_AGENT);
    }
    if let Some(body) = &request.body {
        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            builder = builder.json(body);
        }
    }

    let upstream = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            warn!("proxy upstream error: {err}");
            let details = if err.is_timeout() {
                format!("upstream request timed out after {}s", crate::UPSTREAM_TIMEOUT_SECS)
            } else {
                err.to_string()
            };
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Proxy Internal Error", &details);
        }
    };

    let status = upstream.status();
    let is_json = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);

    let text = match upstream.text().await {
        Ok(text) => text,
        Err(err) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Proxy Internal Error",
                &format!("failed reading upstream body: {err}"),
            )
        }
    };

    let passthrough_status =
        StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);

    // Upstream JSON (declared or undeclared) passes through parsed; anything
    // else is wrapped so the caller always receives JSON.
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => (passthrough_status, Json(value)).into_response(),
        Err(_) if is_json => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Proxy Internal Error",
            "upstream declared JSON but sent an unparsable body",
        ),
        Err(_) => (
            passthrough_status,
            Json(json!({
                "message": "Upstream returned non-JSON content",
                "raw_content": text,
                "status": status.as_u16(),
            })),
        )
            .into_response(),
    }
}

/// Smart URL fix: prefix `https://` when no scheme is present.
pub fn normalize_target_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

fn parse_headers(raw: Option<&str>) -> Result<serde_json::Map<String, Value>, String> {
    let Some(raw) = raw else {
        return Ok(serde_json::Map::new());
    };
    if raw.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("headers must be a JSON object, got {other}")),
        Err(err) => Err(format!("headers were not valid JSON: {err}")),
    }
}

fn header_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_response(status: StatusCode, error: &str, details: &str) -> Response {
    (status, Json(json!({"error": error, "details": details}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_prefixed_when_absent() {
        assert_eq!(
            normalize_target_url("api.example.com/list"),
            "https://api.example.com/list"
        );
        assert_eq!(
            normalize_target_url("http://202.72.235.218:8082/api"),
            "http://202.72.235.218:8082/api"
        );
        assert_eq!(
            normalize_target_url("https://secure.example.com"),
            "https://secure.example.com"
        );
    }

    #[test]
    fn header_string_must_be_a_json_object() {
        assert!(parse_headers(Some(r#"{"X-Token": "abc"}"#)).is_ok());
        assert!(parse_headers(None).unwrap().is_empty());
        assert!(parse_headers(Some("[]")).is_err());
        assert!(parse_headers(Some("{oops")).is_err());
    }
}
