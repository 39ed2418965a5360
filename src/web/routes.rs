use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::AppState;
use crate::classify::EmotionsSummary;
use crate::error::{PipelineError, RateLimitInfo};
use crate::pipeline::TopPost;

/// Build the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/region", post(region))
        .route("/api/chat", post(chat))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RegionRequest {
    /// Free-text region; missing or blank means a global request.
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub region: String,
    pub emotions_summary: EmotionsSummary,
    pub top_posts: Vec<TopPost>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

async fn region(
    State(state): State<AppState>,
    Json(request): Json<RegionRequest>,
) -> Response {
    match state.pipeline.handle_region_request(&request.region).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let result = state
        .chat
        .answer(
            &request.question,
            &request.emotions_summary,
            &request.top_posts,
            &request.region,
        )
        .await;

    match result {
        Ok(answer) => Json(ChatResponse { answer }).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// Map a terminal pipeline error onto a status code and structured JSON body.
fn error_response(error: &PipelineError) -> Response {
    let status = status_for(error);

    let mut body = json!({ "error": error.to_string() });
    if let Some(suggestion) = error.suggestion() {
        body["suggestion"] = json!(suggestion);
    }
    if let PipelineError::RateLimited { info } = error {
        body["rateLimited"] = json!(true);
        body["rateLimitInfo"] = rate_limit_json(info);
    }
    if let PipelineError::InvalidInput { field, message } = error {
        body["details"] = json!({ "field": field, "message": message });
    }

    (status, Json(body)).into_response()
}

fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::RegionNotFound { .. }
        | PipelineError::NoPosts { .. }
        | PipelineError::NoneMatchedRegion { .. } => StatusCode::NOT_FOUND,
        PipelineError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::GeocodeUnavailable { .. } => StatusCode::BAD_GATEWAY,
        PipelineError::MissingCredential { .. }
        | PipelineError::LlmFailed { .. }
        | PipelineError::EmptyAnswer => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn rate_limit_json(info: &RateLimitInfo) -> serde_json::Value {
    serde_json::to_value(info).unwrap_or_else(|_| json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&PipelineError::RegionNotFound {
                region: "atlantis".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&PipelineError::NoneMatchedRegion {
                region: "paris".to_string(),
                fetched: 40
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&PipelineError::InvalidInput {
                field: "question".to_string(),
                message: "empty".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PipelineError::RateLimited {
                info: RateLimitInfo::default()
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&PipelineError::GeocodeUnavailable {
                reason: "timeout".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&PipelineError::EmptyAnswer),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limit_info_serializes_into_body() {
        let info = RateLimitInfo {
            retry_after_secs: Some(30),
            remaining: Some(0),
            source: "newsapi".to_string(),
        };
        let value = rate_limit_json(&info);
        assert_eq!(value["retryAfterSecs"], 30);
        assert_eq!(value["source"], "newsapi");
    }
}
