// API key administration.
//
// GET   /api/keys        stored keys, masked
// POST  /api/keys        {token, label?}
// PATCH /api/keys/{id}   {active}
//
// Tokens never leave the server in full.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::db::models::ApiKey;
use crate::quota::Credential;
use crate::web::{api_error, internal_error, AppState};

#[derive(Deserialize)]
pub struct NewKeyRequest {
    #[serde(default)]
    pub token: String,
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateKeyRequest {
    pub active: bool,
}

/// GET /api/keys
pub async fn list_keys(State(state): State<AppState>) -> Response {
    match state.db.list_api_keys().await {
        Ok(keys) => {
            let keys: Vec<serde_json::Value> = keys.iter().map(key_to_json).collect();
            Json(serde_json::json!({
                "keys": keys,
                "envKeys": state.config.youtube_api_keys.len(),
            }))
            .into_response()
        }
        Err(e) => internal_error(&e, "DB error listing API keys"),
    }
}

/// POST /api/keys
pub async fn add_key(State(state): State<AppState>, Json(body): Json<NewKeyRequest>) -> Response {
    let token = body.token.trim();
    if token.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Key token is required");
    }

    let existing = match state.db.list_api_keys().await {
        Ok(keys) => keys,
        Err(e) => return internal_error(&e, "DB error listing API keys"),
    };
    if existing.iter().any(|k| k.token == token) {
        return api_error(StatusCode::CONFLICT, "Key already stored");
    }

    let label = body.label.as_deref().map(str::trim).filter(|l| !l.is_empty());
    match state.db.add_api_key(label, token).await {
        Ok(id) => {
            info!(key_id = id, key = %Credential::new(token), "API key added");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": id, "key": Credential::new(token).masked() })),
            )
                .into_response()
        }
        Err(e) => internal_error(&e, "DB error adding API key"),
    }
}

/// PATCH /api/keys/{id}
pub async fn update_key(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateKeyRequest>,
) -> Response {
    match state.db.set_api_key_active(id, body.active).await {
        Ok(true) => {
            info!(key_id = id, active = body.active, "API key updated");
            Json(serde_json::json!({ "id": id, "active": body.active })).into_response()
        }
        Ok(false) => api_error(StatusCode::NOT_FOUND, "Key not found"),
        Err(e) => internal_error(&e, "DB error updating API key"),
    }
}

fn key_to_json(key: &ApiKey) -> serde_json::Value {
    serde_json::json!({
        "id": key.id,
        "label": key.label,
        "key": Credential::new(key.token.as_str()).masked(),
        "active": key.active,
        "createdAt": key.created_at,
    })
}
