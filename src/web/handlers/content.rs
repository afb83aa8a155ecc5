// Content handlers.
//
// GET    /api/content       newest first, ?limit= (default 50, max 500)
// POST   /api/content       create with zeroed reactions
// GET    /api/content/{id}  single item with reactions
// DELETE /api/content/{id}  item plus its votes and reports

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::db::models::NewContent;
use crate::web::{api_error, internal_error, AppState};

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /api/content
pub async fn list_content(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    match state.db.list_content(limit).await {
        Ok(items) => Json(serde_json::json!({
            "content": items,
            "count": items.len(),
        }))
        .into_response(),
        Err(e) => internal_error(&e, "DB error listing content"),
    }
}

/// POST /api/content
pub async fn create_content(
    State(state): State<AppState>,
    Json(new): Json<NewContent>,
) -> Response {
    if new.title.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Title is required");
    }

    let id = uuid::Uuid::new_v4().to_string();
    match state.db.insert_content(&id, &new).await {
        Ok(content) => {
            info!(content_id = %content.id, kind = %content.kind, "Content created");
            (StatusCode::CREATED, Json(content)).into_response()
        }
        Err(e) => internal_error(&e, "DB error creating content"),
    }
}

/// GET /api/content/{id}
pub async fn get_content(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.db.get_content(&id).await {
        Ok(Some(content)) => Json(content).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Content not found"),
        Err(e) => internal_error(&e, "DB error fetching content"),
    }
}

/// DELETE /api/content/{id}
pub async fn delete_content(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.db.delete_content(&id).await {
        Ok(true) => {
            info!(content_id = %id, "Content deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => api_error(StatusCode::NOT_FOUND, "Content not found"),
        Err(e) => internal_error(&e, "DB error deleting content"),
    }
}
