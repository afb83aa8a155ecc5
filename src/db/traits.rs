// Database trait: backend-agnostic async interface for all DB operations.
//
// Implementors: SqliteDatabase (wraps rusqlite). All methods are async so a
// native async driver can sit behind the same interface later.
//
// Components only ever see `Arc<dyn Database>`; nothing reaches for a
// global connection.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{ApiKey, Content, NewContent, ReactionUpdate, UpdateOutcome};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Content ---

    /// Create a content item with zeroed reactions.
    async fn insert_content(&self, id: &str, new: &NewContent) -> Result<Content>;

    /// Point lookup by ID, reactions included.
    async fn get_content(&self, id: &str) -> Result<Option<Content>>;

    /// Newest content first.
    async fn list_content(&self, limit: u32) -> Result<Vec<Content>>;

    /// Delete a content item and its reactions. Returns false if it didn't exist.
    async fn delete_content(&self, id: &str) -> Result<bool>;

    // --- Reactions ---

    /// Conditionally apply a field-level reaction update as one atomic step.
    async fn apply_reaction_update(
        &self,
        content_id: &str,
        user_id: &str,
        update: &ReactionUpdate,
    ) -> Result<UpdateOutcome>;

    /// Set the `fixed` flag on a user's report. Returns false if there is none.
    async fn mark_report_fixed(&self, content_id: &str, reported_by: &str) -> Result<bool>;

    // --- API keys ---

    /// All stored keys, active or not, in rotation order.
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>>;

    /// Store a new key and return its ID.
    async fn add_api_key(&self, label: Option<&str>, token: &str) -> Result<i64>;

    /// Enable or disable a key. Returns false if the ID doesn't exist.
    async fn set_api_key_active(&self, id: i64, active: bool) -> Result<bool>;
}
