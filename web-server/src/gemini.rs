//! The `/api/gemini` relay handler.
//!
//! Dispatches `{action, payload}` requests to the analysis collaborator so
//! the API key stays server-side. Collaborator failures come back as `500`
//! with an `{error}` envelope; an unrecognized action is `400`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use api_workbench::ai::{AiConfig, AnalysisService, GeminiClient};

use crate::AppState;

const GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiRelayRequest {
    action: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload {
    user_query: String,
    #[serde(default)]
    data_sample: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanPayload {
    input_text: String,
}

pub(crate) async fn handle(
    State(state): State<AppState>,
    Json(request): Json<GeminiRelayRequest>,
) -> Response {
    let Some(api_key) = state.gemini_api_key.clone() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server Configuration Error: API Key missing",
        );
    };

    let client = match GeminiClient::new(AiConfig::new(api_key, GEMINI_MODEL)) {
        Ok(client) => client,
        Err(err) => {
            warn!("gemini client init failed: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server Configuration Error");
        }
    };

    match request.action.as_str() {
        "analyze" => match client.analyze(&request.payload).await {
            Ok(result) => (StatusCode::OK, Json(result)).into_response(),
            Err(err) => collaborator_failure(err),
        },
        "chat" => {
            let payload: ChatPayload = match serde_json::from_value(request.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("Invalid chat payload: {err}"),
                    )
                }
            };
            match client.chat(&payload.user_query, &payload.data_sample).await {
                Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
                Err(err) => collaborator_failure(err),
            }
        }
        "scan" => {
            let payload: ScanPayload = match serde_json::from_value(request.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("Invalid scan payload: {err}"),
                    )
                }
            };
            match client.scan(&payload.input_text).await {
                Ok(candidates) => (StatusCode::OK, Json(candidates)).into_response(),
                Err(err) => collaborator_failure(err),
            }
        }
        _ => error_response(StatusCode::BAD_REQUEST, "Invalid action"),
    }
}

fn collaborator_failure(err: api_workbench::AiError) -> Response {
    warn!("collaborator request failed: {err}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to process AI request",
    )
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({"error": error}))).into_response()
}
