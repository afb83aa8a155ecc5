// Reaction ledger: per-content like/unlike counters, each user's last
// action, and an append-only report log.

pub mod command;
pub mod error;
pub mod ledger;

pub use command::{ReactionCommand, ReportPolicy};
pub use error::ReactionError;
pub use ledger::{LedgerOptions, ReactionLedger};
