// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The last action a user took on a content item.
///
/// A user holds at most one entry in the per-content map. `Report` marks the
/// entry but never moves the like/unlike counters by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Like,
    Unlike,
    Report,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Like => "like",
            UserAction::Unlike => "unlike",
            UserAction::Report => "report",
        }
    }

    /// Parse the stored/wire form. Unknown values return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(UserAction::Like),
            "unlike" => Some(UserAction::Unlike),
            "report" => Some(UserAction::Report),
            _ => None,
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a content item's report log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub report_text: String,
    pub reported_by: String,
    /// RFC 3339 timestamp
    pub reported_at: String,
    pub fixed: bool,
}

/// Aggregate reaction state embedded in every content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentReactions {
    pub likes: u64,
    pub unlikes: u64,
    /// user id -> last action
    pub users: BTreeMap<String, UserAction>,
    pub reports: Vec<ReportEntry>,
}

impl ContentReactions {
    /// Number of users whose current entry equals `action`.
    pub fn count_users(&self, action: UserAction) -> u64 {
        self.users.values().filter(|a| **a == action).count() as u64
    }

    /// Whether `user_id` already has an entry in the report log.
    pub fn has_report_from(&self, user_id: &str) -> bool {
        self.reports.iter().any(|r| r.reported_by == user_id)
    }
}

/// A content item (blog post, video page, ...) with its reactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub author_id: Option<String>,
    pub created_at: String,
    pub reactions: ContentReactions,
}

/// Fields supplied by the caller when creating content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContent {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author_id: Option<String>,
}

fn default_kind() -> String {
    "blog".to_string()
}

/// What happens to the user's map entry as part of a reaction update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEntry {
    Set(UserAction),
    Remove,
}

/// A field-level update to a content item's reactions, guarded by the
/// user's prior entry.
///
/// This is the store-side equivalent of a filtered
/// `{$inc, $set | $unset, $push}` document update: the store applies every
/// part of it or none of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionUpdate {
    /// The user's entry must still equal this when the update lands.
    pub expected: Option<UserAction>,
    pub likes_delta: i64,
    pub unlikes_delta: i64,
    pub user_entry: UserEntry,
    /// Appended to the report log; the store also requires that the user
    /// has no report yet.
    pub push_report: Option<ReportEntry>,
}

/// Result of a conditional reaction update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update landed. Carries the post-update snapshot.
    Applied(ContentReactions),
    /// The filter no longer matched (someone else got there first).
    Conflict,
    /// No content item with that id.
    NotFound,
}

/// An API key stored through the admin configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub label: Option<String>,
    pub token: String,
    pub active: bool,
    pub created_at: String,
}
