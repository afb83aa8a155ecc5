// YouTube lookups through the rotating key pool.
//
// GET /api/youtube/videos/{id}                 video metadata
// GET /api/youtube/channels/{id}/videos?max=   channel uploads (default 50)
// GET /api/youtube/playlists/{id}/videos?max=  playlist items (default 50)
//
// 503 means every key failed; the body carries the generic exhausted
// message, never per-key details.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::web::{api_error, fetch_error, internal_error, AppState};
use crate::youtube::channels::{fetch_channel_uploads, fetch_playlist_videos};
use crate::youtube::videos::fetch_video;

const DEFAULT_LIST_VIDEOS: usize = 50;
const MAX_LIST_VIDEOS: usize = 500;

#[derive(Deserialize, Default)]
pub struct VideoListQuery {
    pub max: Option<usize>,
}

impl VideoListQuery {
    fn max_items(&self) -> usize {
        self.max
            .unwrap_or(DEFAULT_LIST_VIDEOS)
            .clamp(1, MAX_LIST_VIDEOS)
    }
}

/// GET /api/youtube/videos/{id}
pub async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let credentials = match state.credentials().await {
        Ok(c) => c,
        Err(e) => return internal_error(&e, "Failed to load API keys"),
    };
    let deadline = state.config.fetch_deadline();

    match fetch_video(&state.youtube, &state.fetcher, &credentials, deadline.token(), &id).await {
        Ok(Some(video)) => Json(video).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => fetch_error(&e),
    }
}

/// GET /api/youtube/channels/{id}/videos
pub async fn list_channel_videos(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<VideoListQuery>,
) -> Response {
    let max = params.max_items();

    let credentials = match state.credentials().await {
        Ok(c) => c,
        Err(e) => return internal_error(&e, "Failed to load API keys"),
    };
    let deadline = state.config.fetch_deadline();

    match fetch_channel_uploads(
        &state.youtube,
        &state.fetcher,
        &credentials,
        deadline.token(),
        &id,
        Some(max),
    )
    .await
    {
        Ok(Some(videos)) => Json(serde_json::json!({
            "channelId": id,
            "videos": videos,
            "count": videos.len(),
        }))
        .into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Channel not found"),
        Err(e) => fetch_error(&e),
    }
}

/// GET /api/youtube/playlists/{id}/videos
pub async fn list_playlist_videos(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<VideoListQuery>,
) -> Response {
    let credentials = match state.credentials().await {
        Ok(c) => c,
        Err(e) => return internal_error(&e, "Failed to load API keys"),
    };
    let deadline = state.config.fetch_deadline();

    match fetch_playlist_videos(
        &state.youtube,
        &state.fetcher,
        &credentials,
        deadline.token(),
        &id,
        Some(params.max_items()),
    )
    .await
    {
        Ok(videos) => Json(serde_json::json!({
            "playlistId": id,
            "videos": videos,
            "count": videos.len(),
        }))
        .into_response(),
        Err(e) => fetch_error(&e),
    }
}
