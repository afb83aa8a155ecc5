// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{
    ApiKey, Content, ContentReactions, NewContent, ReactionUpdate, ReportEntry, UpdateOutcome,
    UserAction, UserEntry,
};

// --- Content ---

/// Insert a new content item with zeroed reactions.
pub fn insert_content(conn: &Connection, id: &str, new: &NewContent) -> Result<Content> {
    let created_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO content (id, kind, title, body, author_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, new.kind, new.title, new.body, new.author_id, created_at],
    )
    .with_context(|| format!("Failed to insert content {id}"))?;

    Ok(Content {
        id: id.to_string(),
        kind: new.kind.clone(),
        title: new.title.clone(),
        body: new.body.clone(),
        author_id: new.author_id.clone(),
        created_at,
        reactions: ContentReactions::default(),
    })
}

/// Load a content item and its reactions.
pub fn get_content(conn: &Connection, id: &str) -> Result<Option<Content>> {
    let row = conn
        .query_row(
            "SELECT id, kind, title, body, author_id, created_at
             FROM content WHERE id = ?1",
            params![id],
            content_from_row,
        )
        .optional()?;

    match row {
        Some(mut content) => {
            content.reactions = load_reactions(conn, id)?.unwrap_or_default();
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

/// List content items, newest first.
pub fn list_content(conn: &Connection, limit: u32) -> Result<Vec<Content>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, title, body, author_id, created_at
         FROM content ORDER BY created_at DESC, id LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit], content_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut items = Vec::with_capacity(rows.len());
    for mut content in rows {
        content.reactions = load_reactions(conn, &content.id)?.unwrap_or_default();
        items.push(content);
    }
    Ok(items)
}

/// Delete a content item together with its votes and reports.
/// Returns false if nothing matched.
pub fn delete_content(conn: &mut Connection, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM content_votes WHERE content_id = ?1",
        params![id],
    )?;
    tx.execute(
        "DELETE FROM content_reports WHERE content_id = ?1",
        params![id],
    )?;
    let deleted = tx.execute("DELETE FROM content WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

fn content_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content {
        id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        author_id: row.get(4)?,
        created_at: row.get(5)?,
        reactions: ContentReactions::default(),
    })
}

// --- Reactions ---

/// Assemble the reactions snapshot for a content item.
/// Returns None if the content item doesn't exist.
pub fn load_reactions(conn: &Connection, content_id: &str) -> Result<Option<ContentReactions>> {
    let counters: Option<(i64, i64)> = conn
        .query_row(
            "SELECT likes, unlikes FROM content WHERE id = ?1",
            params![content_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((likes, unlikes)) = counters else {
        return Ok(None);
    };

    let mut reactions = ContentReactions {
        likes: likes.max(0) as u64,
        unlikes: unlikes.max(0) as u64,
        ..Default::default()
    };

    let mut stmt =
        conn.prepare("SELECT user_id, action FROM content_votes WHERE content_id = ?1")?;
    let votes = stmt
        .query_map(params![content_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (user_id, action) in votes {
        reactions.users.insert(user_id, parse_stored_action(&action)?);
    }

    let mut stmt = conn.prepare(
        "SELECT report_text, reported_by, reported_at, fixed
         FROM content_reports WHERE content_id = ?1 ORDER BY id",
    )?;
    reactions.reports = stmt
        .query_map(params![content_id], |row| {
            Ok(ReportEntry {
                report_text: row.get(0)?,
                reported_by: row.get(1)?,
                reported_at: row.get(2)?,
                fixed: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(reactions))
}

/// Apply a reaction update if its filter still matches.
///
/// The filter (content exists, the user's entry equals `update.expected`,
/// and no report exists when one is being pushed) is checked and the update
/// written inside a single transaction, so concurrent callers can't both
/// succeed against the same prior state.
pub fn apply_reaction_update(
    conn: &mut Connection,
    content_id: &str,
    user_id: &str,
    update: &ReactionUpdate,
) -> Result<UpdateOutcome> {
    let tx = conn.transaction()?;

    let counters: Option<(i64, i64)> = tx
        .query_row(
            "SELECT likes, unlikes FROM content WHERE id = ?1",
            params![content_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((likes, unlikes)) = counters else {
        return Ok(UpdateOutcome::NotFound);
    };

    let current: Option<String> = tx
        .query_row(
            "SELECT action FROM content_votes WHERE content_id = ?1 AND user_id = ?2",
            params![content_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    let current = current.as_deref().map(parse_stored_action).transpose()?;
    if current != update.expected {
        // Dropping the transaction rolls it back.
        return Ok(UpdateOutcome::Conflict);
    }

    if update.push_report.is_some() {
        let already_reported: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM content_reports WHERE content_id = ?1 AND reported_by = ?2",
            params![content_id, user_id],
            |row| row.get(0),
        )?;
        if already_reported {
            return Ok(UpdateOutcome::Conflict);
        }
    }

    if likes + update.likes_delta < 0 || unlikes + update.unlikes_delta < 0 {
        anyhow::bail!(
            "Reaction update would drive counters negative on {content_id} \
             (likes {likes}{:+}, unlikes {unlikes}{:+})",
            update.likes_delta,
            update.unlikes_delta
        );
    }

    if update.likes_delta != 0 || update.unlikes_delta != 0 {
        tx.execute(
            "UPDATE content SET likes = likes + ?2, unlikes = unlikes + ?3 WHERE id = ?1",
            params![content_id, update.likes_delta, update.unlikes_delta],
        )?;
    }

    match update.user_entry {
        UserEntry::Set(action) => {
            tx.execute(
                "INSERT INTO content_votes (content_id, user_id, action)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(content_id, user_id) DO UPDATE SET action = excluded.action",
                params![content_id, user_id, action.as_str()],
            )?;
        }
        UserEntry::Remove => {
            tx.execute(
                "DELETE FROM content_votes WHERE content_id = ?1 AND user_id = ?2",
                params![content_id, user_id],
            )?;
        }
    }

    if let Some(ref report) = update.push_report {
        tx.execute(
            "INSERT INTO content_reports (content_id, reported_by, report_text, reported_at, fixed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                content_id,
                report.reported_by,
                report.report_text,
                report.reported_at,
                report.fixed as i64
            ],
        )?;
    }

    let snapshot = load_reactions(&tx, content_id)?
        .context("Content vanished inside its own update transaction")?;
    tx.commit()?;

    Ok(UpdateOutcome::Applied(snapshot))
}

/// Mark a user's report on a content item as fixed.
/// Returns false if no such report exists.
pub fn mark_report_fixed(conn: &Connection, content_id: &str, reported_by: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE content_reports SET fixed = 1 WHERE content_id = ?1 AND reported_by = ?2",
        params![content_id, reported_by],
    )?;
    Ok(updated > 0)
}

fn parse_stored_action(value: &str) -> Result<UserAction> {
    UserAction::parse(value)
        .ok_or_else(|| anyhow::anyhow!("Unknown vote action in database: {value:?}"))
}

// --- API keys ---

/// All stored API keys in insertion order (rotation order).
pub fn list_api_keys(conn: &Connection) -> Result<Vec<ApiKey>> {
    let mut stmt =
        conn.prepare("SELECT id, label, token, active, created_at FROM api_keys ORDER BY id")?;
    let keys = stmt
        .query_map([], |row| {
            Ok(ApiKey {
                id: row.get(0)?,
                label: row.get(1)?,
                token: row.get(2)?,
                active: row.get::<_, i64>(3)? != 0,
                created_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

/// Store a new API key (active by default) and return its ID.
pub fn add_api_key(conn: &Connection, label: Option<&str>, token: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO api_keys (label, token) VALUES (?1, ?2)",
        params![label, token],
    )
    .context("Failed to store API key (is it already registered?)")?;
    Ok(conn.last_insert_rowid())
}

/// Flip a key's active flag. Returns false if the ID doesn't exist.
pub fn set_api_key_active(conn: &Connection, id: i64, active: bool) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE api_keys SET active = ?2 WHERE id = ?1",
        params![id, active as i64],
    )?;
    Ok(updated > 0)
}
