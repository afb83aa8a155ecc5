// API credentials: opaque tokens for quota-limited external APIs.
//
// Keys come from two places: the YOUTUBE_API_KEYS env var and the api_keys
// table managed through the admin surface. Lookup merges them env-first,
// drops inactive keys and duplicates, and hands the fetcher a ready-to-use
// ordered list.

use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use tracing::debug;

use crate::db::Database;

/// An opaque access token plus its `active` flag.
///
/// `Debug` and `Display` only ever show the masked form, so a credential can
/// be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    active: bool,
}

impl Credential {
    /// An active credential.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            active: true,
        }
    }

    pub fn with_active(token: impl Into<String>, active: bool) -> Self {
        Self {
            token: token.into(),
            active,
        }
    }

    /// The raw token, for building the request.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last four characters only, e.g. `…x9Qk`.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("…{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.masked())
            .field("active", &self.active)
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Keep only active credentials, preserving order and dropping repeated tokens.
pub fn active_only(credentials: impl IntoIterator<Item = Credential>) -> Vec<Credential> {
    let mut seen = HashSet::new();
    credentials
        .into_iter()
        .filter(|c| c.is_active() && !c.token.trim().is_empty())
        .filter(|c| seen.insert(c.token.clone()))
        .collect()
}

/// Split a comma-separated key list (the YOUTUBE_API_KEYS format).
pub fn parse_key_list(raw: &str) -> Vec<Credential> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Credential::new)
        .collect()
}

/// Build the rotation list: env keys first, then active keys from the database.
pub async fn load_credentials(env_keys: &[String], db: &dyn Database) -> Result<Vec<Credential>> {
    let stored = db.list_api_keys().await?;

    let merged = env_keys
        .iter()
        .map(|k| Credential::new(k.clone()))
        .chain(
            stored
                .into_iter()
                .map(|k| Credential::with_active(k.token, k.active)),
        );
    let credentials = active_only(merged);

    debug!(
        env_keys = env_keys.len(),
        usable = credentials.len(),
        "Loaded API credentials"
    );

    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_all_but_tail() {
        let c = Credential::new("AIzaSyExampleKey1234");
        assert_eq!(c.masked(), "…1234");
        assert!(!format!("{c:?}").contains("AIzaSy"));
        assert_eq!(c.to_string(), "…1234");
    }

    #[test]
    fn test_masked_short_token() {
        assert_eq!(Credential::new("abc").masked(), "****");
        assert_eq!(Credential::new("").masked(), "****");
    }

    #[test]
    fn test_masked_multibyte_token_does_not_panic() {
        assert_eq!(Credential::new("ключ-ключ").masked(), "…ключ");
    }

    #[test]
    fn test_active_only_filters_and_dedupes() {
        let list = vec![
            Credential::new("a1"),
            Credential::with_active("b2", false),
            Credential::new("c3"),
            Credential::new("a1"),
            Credential::new("  "),
        ];
        let tokens: Vec<String> = active_only(list)
            .iter()
            .map(|c| c.token().to_string())
            .collect();
        assert_eq!(tokens, vec!["a1", "c3"]);
    }

    #[test]
    fn test_parse_key_list() {
        let keys = parse_key_list(" k1, k2,,k3 ,");
        let tokens: Vec<&str> = keys.iter().map(|c| c.token()).collect();
        assert_eq!(tokens, vec!["k1", "k2", "k3"]);
        assert!(parse_key_list("").is_empty());
    }

    #[tokio::test]
    async fn test_load_credentials_env_first_then_active_db_keys() {
        let db = crate::db::open_in_memory().unwrap();
        db.add_api_key(Some("db-1"), "db-key-1").await.unwrap();
        let disabled = db.add_api_key(None, "db-key-2").await.unwrap();
        db.add_api_key(None, "env-key-1").await.unwrap();
        db.set_api_key_active(disabled, false).await.unwrap();

        let env = vec!["env-key-1".to_string()];
        let creds = load_credentials(&env, db.as_ref()).await.unwrap();
        let tokens: Vec<&str> = creds.iter().map(|c| c.token()).collect();
        assert_eq!(tokens, vec!["env-key-1", "db-key-1"]);
    }
}
