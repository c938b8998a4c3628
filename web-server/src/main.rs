//! Relay server for the API workbench.
//!
//! Exposes the two same-origin relay endpoints the browser-side pipeline
//! falls back to: `POST /api/proxy` (CORS-free forwarding to arbitrary
//! targets) and `POST /api/gemini` (server-side analysis collaborator, so
//! the API key never reaches the client). Both are CORS-open.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod gemini;
mod proxy;

/// Bounded upstream timeout for proxied requests.
const UPSTREAM_TIMEOUT_SECS: u64 = 15;

// Application state
#[derive(Clone)]
pub struct AppState {
    /// Outbound client for proxied upstream requests.
    pub client: reqwest::Client,
    /// Server-side collaborator credential; absent means /api/gemini
    /// answers 500 rather than the server failing to start.
    pub gemini_api_key: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_workbench_server=info,tower_http=debug".to_string()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
    if gemini_api_key.is_none() {
        info!("GEMINI_API_KEY not set; /api/gemini will report a configuration error");
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
        .build()?;

    let app_state = AppState {
        client,
        gemini_api_key,
    };

    let app = create_router(app_state);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting relay server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/proxy", post(proxy::handle))
        .route("/api/gemini", post(gemini::handle))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        message: "Relay server is active.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state_without_key() -> AppState {
        AppState {
            client: reqwest::Client::new(),
            gemini_api_key: None,
        }
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let app = create_router(state_without_key());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gemini_endpoint_reports_missing_key() {
        let app = create_router(state_without_key());
        let request = Request::post("/api/gemini")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"action":"analyze","payload":{}}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
