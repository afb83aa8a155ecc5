// Video metadata: `videos.list` through the quota fetcher.
//
// The API reports statistics as decimal strings and durations as ISO 8601
// (`PT1H2M3S`); both are normalised here so callers get plain numbers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::YouTubeClient;
use crate::quota::{Credential, FetchError, QuotaRotatingFetcher};

/// The fields the platform shows for a video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: Option<String>,
    pub tags: Vec<String>,
    pub duration_secs: Option<u64>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub thumbnail_url: Option<String>,
}

/// Fetch one video's metadata, rotating keys on quota errors.
///
/// Returns `Ok(None)` when the API knows no video with that ID (it answers
/// 200 with an empty item list rather than 404).
pub async fn fetch_video(
    client: &YouTubeClient,
    fetcher: &QuotaRotatingFetcher,
    credentials: &[Credential],
    cancel: &CancellationToken,
    video_id: &str,
) -> Result<Option<VideoMetadata>, FetchError> {
    let response: VideoListResponse = fetcher
        .fetch_cancellable(credentials, cancel, |credential| async move {
            client
                .api_get(
                    &credential,
                    "videos",
                    &[("part", "snippet,contentDetails,statistics"), ("id", video_id)],
                )
                .await
        })
        .await?;

    let video = response.items.into_iter().next().map(VideoMetadata::from);
    info!(
        video_id = video_id,
        found = video.is_some(),
        "Fetched video metadata"
    );
    Ok(video)
}

impl From<VideoItem> for VideoMetadata {
    fn from(item: VideoItem) -> Self {
        let snippet = item.snippet.unwrap_or_default();
        let stats = item.statistics.unwrap_or_default();
        let duration_secs = item
            .content_details
            .and_then(|d| d.duration)
            .and_then(|d| parse_iso8601_duration(&d));

        Self {
            id: item.id,
            thumbnail_url: best_thumbnail(&snippet.thumbnails),
            title: snippet.title,
            description: snippet.description,
            channel_id: snippet.channel_id,
            channel_title: snippet.channel_title,
            published_at: snippet.published_at,
            tags: snippet.tags,
            duration_secs,
            view_count: parse_count(stats.view_count.as_deref()),
            like_count: parse_count(stats.like_count.as_deref()),
            comment_count: parse_count(stats.comment_count.as_deref()),
        }
    }
}

fn parse_count(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Pick the largest thumbnail the API offered.
pub fn best_thumbnail(thumbnails: &HashMap<String, Thumbnail>) -> Option<String> {
    ["maxres", "standard", "high", "medium", "default"]
        .iter()
        .find_map(|size| thumbnails.get(*size))
        .map(|t| t.url.clone())
}

/// Convert an ISO 8601 duration (`P1DT2H3M4S`, `PT45S`) to whole seconds.
///
/// Fractional seconds are truncated. Year and month designators are rejected
/// since they have no fixed length in seconds.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for ch in rest.chars() {
        match ch {
            'T' => {
                if in_time || !number.is_empty() {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' | '.' => number.push(ch),
            designator => {
                if number.is_empty() {
                    return None;
                }
                let whole: u64 = number.split('.').next()?.parse().ok()?;
                let unit = match (in_time, designator) {
                    (false, 'W') => 7 * 86_400,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                total = total.checked_add(whole.checked_mul(unit)?)?;
                number.clear();
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return None;
    }
    Some(total)
}

// -- Serde types for videos.list --

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub content_details: Option<VideoContentDetails>,
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSnippet {
    pub published_at: Option<String>,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub tags: Vec<String>,
    pub thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}
