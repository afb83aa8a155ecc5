use crate::db::models::UserAction;

/// Everything `apply_action` can refuse with.
///
/// Validation variants come back before the store is touched; conflict
/// variants come back after the read and before any write.
#[derive(Debug, thiserror::Error)]
pub enum ReactionError {
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Invalid action: {0:?}")]
    InvalidAction(String),

    #[error("Report text is required")]
    MissingReportText,

    #[error("User ID is required")]
    MissingUserId,

    #[error("User {0} has already reported this content")]
    DuplicateReport(String),

    #[error("User {user_id} has already chosen to {action} this content")]
    AlreadyActed { user_id: String, action: UserAction },

    #[error("No report from {reported_by} on content {content_id}")]
    ReportNotFound {
        content_id: String,
        reported_by: String,
    },

    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl ReactionError {
    /// True for errors caused by the request rather than the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ReactionError::Store(_))
    }
}

impl From<anyhow::Error> for ReactionError {
    fn from(err: anyhow::Error) -> Self {
        ReactionError::Store(err)
    }
}
