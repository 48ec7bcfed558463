use super::error::ApiError;
use super::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use grounded_knowledge::{answer_question, corpus_stats, Answer, QueryRequest};
use serde_json::json;
use std::sync::Arc;

pub async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    tracing::info!(
        "Query: '{}' (image: {})",
        request.question.chars().take(50).collect::<String>(),
        request.image.is_some()
    );

    let answer = answer_question(&state.ctx, &request).await?;
    Ok(Json(answer))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match corpus_stats(&state.ctx.store_path).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "api_key_set": state.api_key_set,
                "discourse_chunks": stats.thread_chunks,
                "markdown_chunks": stats.document_chunks,
                "discourse_embeddings": stats.thread_embeddings,
                "markdown_embeddings": stats.document_embeddings,
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                    "api_key_set": state.api_key_set,
                })),
            )
        }
    }
}
