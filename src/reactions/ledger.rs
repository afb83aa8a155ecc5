// Reaction ledger: validate, read, plan, compare-and-set.
//
// Each call reads the content's current reactions, plans a field-level
// update guarded by the user's prior entry, and hands it to the store, which
// applies it only if that entry is unchanged. When another writer got there
// first the store says Conflict and we plan again from a fresh read.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::command::{plan_update, ReactionCommand, ReportPolicy};
use super::error::ReactionError;
use crate::db::models::{ContentReactions, UpdateOutcome};
use crate::db::Database;

/// How many times a lost race is re-planned before giving up.
///
/// A conflict means some other write to the same user's entry committed, so
/// a call can lose at most once per concurrent writer on that entry. The
/// bound has to sit above any realistic burst from one user.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerOptions {
    pub report_policy: ReportPolicy,
    pub max_conflict_retries: u32,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            report_policy: ReportPolicy::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

/// Applies user reactions to content stored behind a [`Database`].
#[derive(Clone)]
pub struct ReactionLedger {
    store: Arc<dyn Database>,
    options: LedgerOptions,
}

impl ReactionLedger {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self::with_options(store, LedgerOptions::default())
    }

    pub fn with_options(store: Arc<dyn Database>, options: LedgerOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    /// Apply `action` by `user_id` to `content_id` and return the reactions
    /// as they stand right after this update.
    pub async fn apply_action(
        &self,
        content_id: &str,
        user_id: &str,
        action: &str,
        report_text: Option<&str>,
    ) -> Result<ContentReactions, ReactionError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ReactionError::MissingUserId);
        }
        let command = ReactionCommand::parse(action, report_text)?;

        self.apply(content_id, user_id, &command).await
    }

    /// Apply an already-validated command.
    pub async fn apply(
        &self,
        content_id: &str,
        user_id: &str,
        command: &ReactionCommand,
    ) -> Result<ContentReactions, ReactionError> {
        let mut conflicts = 0;

        loop {
            let current = self
                .store
                .get_content(content_id)
                .await?
                .ok_or_else(|| ReactionError::ContentNotFound(content_id.to_string()))?;

            let reported_at = chrono::Utc::now().to_rfc3339();
            let update = plan_update(
                command,
                user_id,
                &current.reactions,
                self.options.report_policy,
                &reported_at,
            )?;

            match self
                .store
                .apply_reaction_update(content_id, user_id, &update)
                .await?
            {
                UpdateOutcome::Applied(reactions) => {
                    info!(
                        content_id = content_id,
                        user_id = user_id,
                        action = %command.action(),
                        likes = reactions.likes,
                        unlikes = reactions.unlikes,
                        "Reaction applied"
                    );
                    return Ok(reactions);
                }
                UpdateOutcome::NotFound => {
                    // Deleted between the read and the write.
                    return Err(ReactionError::ContentNotFound(content_id.to_string()));
                }
                UpdateOutcome::Conflict => {
                    conflicts += 1;
                    if conflicts > self.options.max_conflict_retries {
                        warn!(
                            content_id = content_id,
                            user_id = user_id,
                            conflicts,
                            "Giving up on reaction after repeated write conflicts"
                        );
                        return Err(ReactionError::Store(anyhow::anyhow!(
                            "write conflict on content {content_id} persisted after {conflicts} attempts"
                        )));
                    }
                    debug!(
                        content_id = content_id,
                        user_id = user_id,
                        conflicts,
                        "Reaction lost a race, re-reading"
                    );
                }
            }
        }
    }

    /// Flag `reported_by`'s report on `content_id` as fixed.
    pub async fn mark_report_fixed(
        &self,
        content_id: &str,
        reported_by: &str,
    ) -> Result<ContentReactions, ReactionError> {
        let reported_by = reported_by.trim();
        if reported_by.is_empty() {
            return Err(ReactionError::MissingUserId);
        }

        if self.store.get_content(content_id).await?.is_none() {
            return Err(ReactionError::ContentNotFound(content_id.to_string()));
        }

        if !self
            .store
            .mark_report_fixed(content_id, reported_by)
            .await?
        {
            return Err(ReactionError::ReportNotFound {
                content_id: content_id.to_string(),
                reported_by: reported_by.to_string(),
            });
        }

        info!(
            content_id = content_id,
            reported_by = reported_by,
            "Report marked fixed"
        );

        let content = self
            .store
            .get_content(content_id)
            .await?
            .ok_or_else(|| ReactionError::ContentNotFound(content_id.to_string()))?;
        Ok(content.reactions)
    }
}
