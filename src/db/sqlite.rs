// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Holding the lock for the whole of apply_reaction_update also serializes
// writers, on top of the transaction that makes each update atomic.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{ApiKey, Content, NewContent, ReactionUpdate, UpdateOutcome};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn insert_content(&self, id: &str, new: &NewContent) -> Result<Content> {
        let conn = self.conn.lock().await;
        super::queries::insert_content(&conn, id, new)
    }

    async fn get_content(&self, id: &str) -> Result<Option<Content>> {
        let conn = self.conn.lock().await;
        super::queries::get_content(&conn, id)
    }

    async fn list_content(&self, limit: u32) -> Result<Vec<Content>> {
        let conn = self.conn.lock().await;
        super::queries::list_content(&conn, limit)
    }

    async fn delete_content(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        super::queries::delete_content(&mut conn, id)
    }

    async fn apply_reaction_update(
        &self,
        content_id: &str,
        user_id: &str,
        update: &ReactionUpdate,
    ) -> Result<UpdateOutcome> {
        let mut conn = self.conn.lock().await;
        super::queries::apply_reaction_update(&mut conn, content_id, user_id, update)
    }

    async fn mark_report_fixed(&self, content_id: &str, reported_by: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::mark_report_fixed(&conn, content_id, reported_by)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        let conn = self.conn.lock().await;
        super::queries::list_api_keys(&conn)
    }

    async fn add_api_key(&self, label: Option<&str>, token: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::add_api_key(&conn, label, token)
    }

    async fn set_api_key_active(&self, id: i64, active: bool) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::set_api_key_active(&conn, id, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ReportEntry, UserAction, UserEntry};
    use crate::db::schema::create_tables;

    async fn test_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteDatabase::new(conn)
    }

    fn new_post(title: &str) -> NewContent {
        NewContent {
            kind: "blog".to_string(),
            title: title.to_string(),
            body: "body".to_string(),
            author_id: Some("author-1".to_string()),
        }
    }

    fn like_from_nothing() -> ReactionUpdate {
        ReactionUpdate {
            expected: None,
            likes_delta: 1,
            unlikes_delta: 0,
            user_entry: UserEntry::Set(UserAction::Like),
            push_report: None,
        }
    }

    #[tokio::test]
    async fn test_trait_content_roundtrip() {
        let db = test_db().await;
        let created = db.insert_content("c1", &new_post("Hello")).await.unwrap();
        assert_eq!(created.reactions.likes, 0);

        let loaded = db.get_content("c1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Hello");
        assert_eq!(loaded.author_id.as_deref(), Some("author-1"));
        assert!(loaded.reactions.users.is_empty());
        assert!(loaded.reactions.reports.is_empty());

        assert!(db.get_content("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trait_list_content() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("one")).await.unwrap();
        db.insert_content("c2", &new_post("two")).await.unwrap();
        assert_eq!(db.list_content(10).await.unwrap().len(), 2);
        assert_eq!(db.list_content(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trait_duplicate_content_id_rejected() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("one")).await.unwrap();
        assert!(db.insert_content("c1", &new_post("again")).await.is_err());
    }

    #[tokio::test]
    async fn test_trait_apply_update_returns_snapshot() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("post")).await.unwrap();

        let outcome = db
            .apply_reaction_update("c1", "u1", &like_from_nothing())
            .await
            .unwrap();
        let UpdateOutcome::Applied(snapshot) = outcome else {
            panic!("expected Applied, got {outcome:?}");
        };
        assert_eq!(snapshot.likes, 1);
        assert_eq!(snapshot.users.get("u1"), Some(&UserAction::Like));
    }

    #[tokio::test]
    async fn test_trait_apply_update_conflicts_on_stale_expectation() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("post")).await.unwrap();
        db.apply_reaction_update("c1", "u1", &like_from_nothing())
            .await
            .unwrap();

        // Same plan again: the user's entry is now "like", not None
        let outcome = db
            .apply_reaction_update("c1", "u1", &like_from_nothing())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict);

        let content = db.get_content("c1").await.unwrap().unwrap();
        assert_eq!(content.reactions.likes, 1);
    }

    #[tokio::test]
    async fn test_trait_apply_update_not_found() {
        let db = test_db().await;
        let outcome = db
            .apply_reaction_update("nope", "u1", &like_from_nothing())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_trait_apply_update_rejects_negative_counters() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("post")).await.unwrap();
        let update = ReactionUpdate {
            expected: None,
            likes_delta: -1,
            unlikes_delta: 0,
            user_entry: UserEntry::Remove,
            push_report: None,
        };
        assert!(db.apply_reaction_update("c1", "u1", &update).await.is_err());
    }

    #[tokio::test]
    async fn test_trait_report_push_and_fix() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("post")).await.unwrap();

        let update = ReactionUpdate {
            expected: None,
            likes_delta: 0,
            unlikes_delta: 0,
            user_entry: UserEntry::Set(UserAction::Report),
            push_report: Some(ReportEntry {
                report_text: "spam".to_string(),
                reported_by: "u1".to_string(),
                reported_at: "2024-01-01T00:00:00Z".to_string(),
                fixed: false,
            }),
        };
        db.apply_reaction_update("c1", "u1", &update).await.unwrap();

        assert!(db.mark_report_fixed("c1", "u1").await.unwrap());
        assert!(!db.mark_report_fixed("c1", "u2").await.unwrap());

        let content = db.get_content("c1").await.unwrap().unwrap();
        assert_eq!(content.reactions.reports.len(), 1);
        assert!(content.reactions.reports[0].fixed);
    }

    #[tokio::test]
    async fn test_trait_delete_content_removes_reactions() {
        let db = test_db().await;
        db.insert_content("c1", &new_post("post")).await.unwrap();
        db.apply_reaction_update("c1", "u1", &like_from_nothing())
            .await
            .unwrap();

        assert!(db.delete_content("c1").await.unwrap());
        assert!(!db.delete_content("c1").await.unwrap());

        // Re-creating with the same id starts from zero
        let again = db.insert_content("c1", &new_post("post")).await.unwrap();
        assert_eq!(again.reactions, Default::default());
        let loaded = db.get_content("c1").await.unwrap().unwrap();
        assert!(loaded.reactions.users.is_empty());
    }

    #[tokio::test]
    async fn test_trait_api_keys() {
        let db = test_db().await;
        let first = db.add_api_key(Some("primary"), "key-one").await.unwrap();
        let second = db.add_api_key(None, "key-two").await.unwrap();
        assert!(second > first);

        assert!(db.set_api_key_active(first, false).await.unwrap());
        assert!(!db.set_api_key_active(999, false).await.unwrap());

        let keys = db.list_api_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].token, "key-one");
        assert!(!keys[0].active);
        assert!(keys[1].active);

        // Tokens are unique
        assert!(db.add_api_key(None, "key-one").await.is_err());
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = test_db().await;
        assert_eq!(db.table_count().await.unwrap(), 5);
    }
}
