// YouTube Data API client: keyed GET requests that report AttemptResults.
//
// Every request carries one API key. Rather than returning anyhow errors,
// the client classifies each failure so the quota fetcher can decide
// whether the next key is worth trying:
//
//   quota / rate-limit reasons, bare 429  -> QuotaExceeded
//   rejected key, 401, other 403, 5xx     -> RetryableError
//   transport failure                     -> RetryableError
//   404                                   -> FatalError(NotFound)
//   other 4xx                             -> FatalError(InvalidRequest)
//   body that won't deserialize           -> FatalError(Decode)

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::quota::{AttemptResult, Credential, FatalClass, FatalError};

/// Default endpoint for the YouTube Data API v3.
pub const DEFAULT_YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Error reasons Google uses for exhausted quota or throttling.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

/// Error reasons that mean this particular key is unusable.
const KEY_REJECTED_REASONS: &[&str] = &["keyInvalid", "keyExpired", "ipRefererBlocked", "forbidden"];

/// Thin reqwest wrapper for the YouTube Data API.
pub struct YouTubeClient {
    client: reqwest::Client,
    base_url: String,
}

impl YouTubeClient {
    /// Create a client pointing at the given base URL.
    ///
    /// Pass a different URL to target a mock server in tests.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tubekit/0.1 (content-tools)")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}/{resource}` with `key=<credential>` plus `params`.
    pub async fn api_get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        resource: &str,
        params: &[(&str, &str)],
    ) -> AttemptResult<T> {
        let url = format!("{}/{}", self.base_url, resource);

        debug!(resource = resource, credential = %credential, "YouTube API request");

        let response = match self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", credential.token())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return AttemptResult::RetryableError(format!("{resource} request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return classify_failure(status.as_u16(), &body);
        }

        match response.json::<T>().await {
            Ok(value) => AttemptResult::Success(value),
            Err(e) => AttemptResult::FatalError(FatalError::new(
                FatalClass::Decode,
                format!("Failed to deserialize {resource} response: {e}"),
            )),
        }
    }
}

/// Map a non-2xx response onto an attempt outcome.
pub fn classify_failure<T>(status: u16, body: &str) -> AttemptResult<T> {
    let reasons = error_reasons(body);
    let has_reason = |wanted: &[&str]| reasons.iter().any(|r| wanted.contains(&r.as_str()));

    if status == 429 || ((status == 403 || status == 400) && has_reason(QUOTA_REASONS)) {
        return AttemptResult::QuotaExceeded;
    }

    let summary = error_message(body)
        .map(|m| format!("HTTP {status}: {m}"))
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        401 | 403 => AttemptResult::RetryableError(summary),
        400 if has_reason(KEY_REJECTED_REASONS) => AttemptResult::RetryableError(summary),
        404 => AttemptResult::FatalError(FatalError::new(FatalClass::NotFound, summary)),
        400..=499 => AttemptResult::FatalError(FatalError::new(FatalClass::InvalidRequest, summary)),
        500..=599 => AttemptResult::RetryableError(summary),
        _ => AttemptResult::FatalError(FatalError::new(FatalClass::Other, summary)),
    }
}

/// Pull the `reason` strings out of a Google API error body.
fn error_reasons(body: &str) -> Vec<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|env| env.error.errors.into_iter().filter_map(|e| e.reason).collect())
        .unwrap_or_default()
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error.message)
        .filter(|m| !m.is_empty())
}

// -- Serde types for Google API error bodies --

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Deserialize)]
struct ApiErrorItem {
    reason: Option<String>,
}
