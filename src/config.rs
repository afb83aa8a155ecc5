use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::quota::credential::parse_key_list;
use crate::quota::{Deadline, FatalPolicy, OnFatal};
use crate::reactions::ReportPolicy;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Keys from YOUTUBE_API_KEYS, tried before any stored in the database.
    pub youtube_api_keys: Vec<String>,
    /// YouTube Data API base URL (defaults to the public v3 endpoint).
    pub youtube_api_url: String,
    /// What a fatal upstream error does to key rotation.
    pub on_fatal: OnFatal,
    pub report_policy: ReportPolicy,
    /// Overall deadline for one fetch across all keys. None = no deadline.
    pub fetch_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; commands that talk to YouTube check for
    /// keys separately with [`require_youtube_keys`](Self::require_youtube_keys).
    pub fn load() -> Result<Self> {
        let on_fatal = match env::var("TUBEKIT_FATAL_POLICY") {
            Ok(raw) => raw
                .parse::<OnFatal>()
                .context("Invalid TUBEKIT_FATAL_POLICY")?,
            Err(_) => OnFatal::Continue,
        };

        let report_policy = match env::var("TUBEKIT_REPORT_POLICY") {
            Ok(raw) => raw
                .parse::<ReportPolicy>()
                .context("Invalid TUBEKIT_REPORT_POLICY")?,
            Err(_) => ReportPolicy::default(),
        };

        let fetch_timeout = match env::var("TUBEKIT_FETCH_TIMEOUT_SECS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("TUBEKIT_FETCH_TIMEOUT_SECS is not a number: {raw}"))?;
                // 0 disables the deadline
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            db_path: env::var("TUBEKIT_DB_PATH").unwrap_or_else(|_| "./tubekit.db".to_string()),
            youtube_api_keys: parse_key_list(&env::var("YOUTUBE_API_KEYS").unwrap_or_default())
                .into_iter()
                .map(|c| c.token().to_string())
                .collect(),
            youtube_api_url: env::var("YOUTUBE_API_URL").unwrap_or_else(|_| {
                crate::youtube::client::DEFAULT_YOUTUBE_API_URL.to_string()
            }),
            on_fatal,
            report_policy,
            fetch_timeout,
        })
    }

    /// The fatal-error policy handed to the quota fetcher.
    pub fn fatal_policy(&self) -> FatalPolicy {
        FatalPolicy::uniform(self.on_fatal)
    }

    /// A fresh deadline for one fetch. Hold it for the duration of the call.
    pub fn fetch_deadline(&self) -> Deadline {
        Deadline::from_timeout(self.fetch_timeout)
    }

    /// Check that at least one key could be available before calling YouTube.
    ///
    /// `available` is the number of usable keys found in the database.
    pub fn require_youtube_keys(&self, available: usize) -> Result<()> {
        if self.youtube_api_keys.is_empty() && available == 0 {
            anyhow::bail!(
                "No YouTube API keys configured. Set YOUTUBE_API_KEYS in your .env file\n\
                 or add one with `tubekit keys add <KEY>`."
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(keys: &[&str]) -> Config {
        Config {
            db_path: ":memory:".to_string(),
            youtube_api_keys: keys.iter().map(|k| k.to_string()).collect(),
            youtube_api_url: crate::youtube::client::DEFAULT_YOUTUBE_API_URL.to_string(),
            on_fatal: OnFatal::Continue,
            report_policy: ReportPolicy::Overwrite,
            fetch_timeout: None,
        }
    }

    #[test]
    fn test_require_youtube_keys() {
        assert!(config_with_keys(&[]).require_youtube_keys(0).is_err());
        assert!(config_with_keys(&[]).require_youtube_keys(1).is_ok());
        assert!(config_with_keys(&["AIzaA"]).require_youtube_keys(0).is_ok());
    }

    #[test]
    fn test_fatal_policy_follows_setting() {
        let mut config = config_with_keys(&[]);
        assert_eq!(config.fatal_policy(), FatalPolicy::default());
        config.on_fatal = OnFatal::Abort;
        assert_eq!(config.fatal_policy(), FatalPolicy::uniform(OnFatal::Abort));
    }
}
