//! Axum Handlers for the REST API
//!
//! Read-only access to the topic catalog. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    models::{ErrorResponse, Topic},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// List every topic in the catalog.
#[utoipa::path(
    get,
    path = "/topics",
    responses(
        (status = 200, description = "All available topics", body = [Topic])
    )
)]
pub async fn list_topics(State(state): State<Arc<AppState>>) -> Json<Vec<Topic>> {
    Json(state.content.topics().iter().map(Topic::from).collect())
}

/// Get a single topic. The id is matched case-insensitively, ignoring
/// surrounding whitespace.
#[utoipa::path(
    get,
    path = "/topics/{id}",
    responses(
        (status = 200, description = "Topic details", body = Topic),
        (status = 404, description = "Topic not found", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Topic id")
    )
)]
pub async fn get_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Topic>, ApiError> {
    let topic = state.content.find(&id).ok_or_else(|| {
        debug!(topic_id = %id, "Topic lookup missed");
        ApiError::NotFound(format!("Topic '{}' not found", id))
    })?;
    Ok(Json(Topic::from(topic)))
}
