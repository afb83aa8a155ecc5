// Reaction handlers.
//
// PATCH /api/content/{id}/reactions      {userId, action, reportText?}
// POST  /api/content/{id}/reports/fixed  {reportedBy}
//
// Both return the content's reactions as they stand after the change.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::web::{reaction_error, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub action: String,
    pub report_text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixReportRequest {
    #[serde(default)]
    pub reported_by: String,
}

/// PATCH /api/content/{id}/reactions
pub async fn apply_reaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReactionRequest>,
) -> Response {
    match state
        .ledger
        .apply_action(&id, &body.user_id, &body.action, body.report_text.as_deref())
        .await
    {
        Ok(reactions) => Json(reactions).into_response(),
        Err(e) => reaction_error(&e),
    }
}

/// POST /api/content/{id}/reports/fixed
pub async fn mark_report_fixed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FixReportRequest>,
) -> Response {
    match state.ledger.mark_report_fixed(&id, &body.reported_by).await {
        Ok(reactions) => Json(reactions).into_response(),
        Err(e) => reaction_error(&e),
    }
}
