use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    #[serde(default)]
    pub facts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "convention")]
    pub query: String,

    /// Paced SSE when true, one JSON body when false
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Begin API Index");
    let Json(request) = payload.map_err(bad_json)?;

    let report = state.service.index(&request.facts).await?;

    Ok(Json(json!({
        "status": 200,
        "message": "OK",
        "data": {
            "indexed": report.indexed(),
            "failed": report.failed(),
            "outcomes": report.outcomes,
        }
    })))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    tracing::info!("Begin API Chat");
    let Json(request) = payload.map_err(bad_json)?;

    // Generation finishes before the first byte goes out
    let answer = state.service.answer(&request.query).await?;

    if !request.stream {
        return Ok(Json(json!({
            "status": 200,
            "message": "OK",
            "data": {
                "answer": answer.answer,
                "facts": answer.facts,
            }
        }))
        .into_response());
    }

    let stream = state
        .service
        .paced(&answer)
        .map(|token| Ok::<Event, Infallible>(Event::default().data(token)));

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}
