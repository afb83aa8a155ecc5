// Channel uploads: playlist paging under a single key per attempt.
//
// A channel's uploads live in a playlist whose ID comes from
// `channels.list`. Listing a channel is therefore two steps, and both run
// with the same key: if paging dies halfway the next key starts again from
// the channel lookup, so a result never mixes pages from different keys.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::YouTubeClient;
use super::videos::{best_thumbnail, Thumbnail};
use crate::quota::pagination::collect_pages;
use crate::quota::{AttemptResult, Credential, FetchError, Page, QuotaRotatingFetcher};

/// Maximum page size `playlistItems.list` accepts.
const PLAYLIST_PAGE_SIZE: usize = 50;

/// One entry of a channel's upload list (or any playlist).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideo {
    pub video_id: String,
    pub title: String,
    pub published_at: Option<String>,
    pub thumbnail_url: Option<String>,
    pub position: Option<u64>,
}

/// List a channel's uploads, newest first, up to `max_items`.
///
/// Returns `Ok(None)` when the channel doesn't exist or has no uploads
/// playlist.
pub async fn fetch_channel_uploads(
    client: &YouTubeClient,
    fetcher: &QuotaRotatingFetcher,
    credentials: &[Credential],
    cancel: &CancellationToken,
    channel_id: &str,
    max_items: Option<usize>,
) -> Result<Option<Vec<ChannelVideo>>, FetchError> {
    let videos = fetcher
        .fetch_cancellable(credentials, cancel, |credential| async move {
            let channels: ChannelListResponse = match client
                .api_get(
                    &credential,
                    "channels",
                    &[("part", "contentDetails"), ("id", channel_id)],
                )
                .await
            {
                AttemptResult::Success(response) => response,
                AttemptResult::QuotaExceeded => return AttemptResult::QuotaExceeded,
                AttemptResult::RetryableError(e) => return AttemptResult::RetryableError(e),
                AttemptResult::FatalError(e) => return AttemptResult::FatalError(e),
            };

            let Some(uploads) = channels
                .items
                .into_iter()
                .next()
                .and_then(|c| c.content_details)
                .and_then(|d| d.related_playlists.uploads)
            else {
                return AttemptResult::Success(None);
            };

            collect_pages(max_items, |cursor| {
                playlist_page(client, &credential, &uploads, max_items, cursor)
            })
            .await
            .map(Some)
        })
        .await?;

    info!(
        channel_id = channel_id,
        videos = ?videos.as_ref().map(Vec::len),
        "Fetched channel uploads"
    );
    Ok(videos)
}

/// List any playlist's items, rotating keys only when a full walk fails.
///
/// Unlike a channel, a playlist ID needs no lookup first, so every page
/// call goes straight through the fetcher's paginated variant.
pub async fn fetch_playlist_videos(
    client: &YouTubeClient,
    fetcher: &QuotaRotatingFetcher,
    credentials: &[Credential],
    cancel: &CancellationToken,
    playlist_id: &str,
    max_items: Option<usize>,
) -> Result<Vec<ChannelVideo>, FetchError> {
    let videos = fetcher
        .fetch_paginated(credentials, cancel, max_items, |credential, cursor| async move {
            playlist_page(client, &credential, playlist_id, max_items, cursor).await
        })
        .await?;

    info!(
        playlist_id = playlist_id,
        videos = videos.len(),
        "Fetched playlist items"
    );
    Ok(videos)
}

async fn playlist_page(
    client: &YouTubeClient,
    credential: &Credential,
    playlist_id: &str,
    max_items: Option<usize>,
    cursor: Option<String>,
) -> AttemptResult<Page<ChannelVideo>> {
    let page_size = max_items
        .unwrap_or(PLAYLIST_PAGE_SIZE)
        .clamp(1, PLAYLIST_PAGE_SIZE)
        .to_string();

    let mut params: Vec<(&str, &str)> = vec![
        ("part", "snippet,contentDetails"),
        ("playlistId", playlist_id),
        ("maxResults", &page_size),
    ];
    if let Some(ref c) = cursor {
        params.push(("pageToken", c));
    }

    client
        .api_get::<PlaylistItemsResponse>(credential, "playlistItems", &params)
        .await
        .map(PlaylistItemsResponse::into_page)
}

// -- Serde types for channels.list --

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub id: String,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

// -- Serde types for playlistItems.list --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemsResponse {
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub snippet: Option<PlaylistSnippet>,
    pub content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistSnippet {
    pub title: String,
    pub published_at: Option<String>,
    pub position: Option<u64>,
    pub thumbnails: std::collections::HashMap<String, Thumbnail>,
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistContentDetails {
    pub video_id: Option<String>,
    pub video_published_at: Option<String>,
}

impl PlaylistItemsResponse {
    /// Convert to a page, dropping items that carry no video ID
    /// (deleted or private videos).
    pub fn into_page(self) -> Page<ChannelVideo> {
        let items = self
            .items
            .into_iter()
            .filter_map(|item| {
                let snippet = item.snippet.unwrap_or_default();
                let details = item.content_details;
                let video_id = details
                    .as_ref()
                    .and_then(|d| d.video_id.clone())
                    .or_else(|| snippet.resource_id.as_ref().and_then(|r| r.video_id.clone()))?;
                let published_at = details
                    .and_then(|d| d.video_published_at)
                    .or(snippet.published_at.clone());

                Some(ChannelVideo {
                    video_id,
                    thumbnail_url: best_thumbnail(&snippet.thumbnails),
                    title: snippet.title,
                    published_at,
                    position: snippet.position,
                })
            })
            .collect();

        Page {
            items,
            next_cursor: self.next_page_token,
        }
    }
}
