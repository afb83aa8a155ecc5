// Reaction commands: validated input for the ledger, plus the transition
// table that turns (command, prior state) into a store update.

use std::str::FromStr;

use crate::db::models::{ContentReactions, ReactionUpdate, ReportEntry, UserAction, UserEntry};

use super::error::ReactionError;

/// A validated reaction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionCommand {
    Like,
    Unlike,
    Report { text: String },
}

impl ReactionCommand {
    /// Validate a raw `{action, reportText?}` pair from a request body.
    ///
    /// Report text is only looked at for `report`; it's trimmed and must not
    /// be empty.
    pub fn parse(action: &str, report_text: Option<&str>) -> Result<Self, ReactionError> {
        match action.trim() {
            "like" => Ok(ReactionCommand::Like),
            "unlike" => Ok(ReactionCommand::Unlike),
            "report" => {
                let text = report_text.map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    return Err(ReactionError::MissingReportText);
                }
                Ok(ReactionCommand::Report {
                    text: text.to_string(),
                })
            }
            other => Err(ReactionError::InvalidAction(other.to_string())),
        }
    }

    pub fn action(&self) -> UserAction {
        match self {
            ReactionCommand::Like => UserAction::Like,
            ReactionCommand::Unlike => UserAction::Unlike,
            ReactionCommand::Report { .. } => UserAction::Report,
        }
    }
}

/// How a report treats the reporter's existing like/unlike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPolicy {
    /// The map entry becomes `report`; counters are left alone, so the
    /// earlier vote still counts but is no longer attributed to the user.
    #[default]
    Overwrite,
    /// The earlier vote is withdrawn from its counter as the entry becomes
    /// `report`, keeping counters equal to the map.
    Retract,
}

impl FromStr for ReportPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(ReportPolicy::Overwrite),
            "retract" => Ok(ReportPolicy::Retract),
            other => anyhow::bail!("expected \"overwrite\" or \"retract\", got {other:?}"),
        }
    }
}

/// Work out the update for `command` given the user's current entry.
///
/// Pure: conflicts (`AlreadyActed`, `DuplicateReport`) are decided from the
/// snapshot, and the returned update is guarded by `prior` so the store can
/// reject it if the snapshot has gone stale.
pub fn plan_update(
    command: &ReactionCommand,
    user_id: &str,
    reactions: &ContentReactions,
    policy: ReportPolicy,
    reported_at: &str,
) -> Result<ReactionUpdate, ReactionError> {
    let prior = reactions.users.get(user_id).copied();

    let update = |likes_delta, unlikes_delta, user_entry| ReactionUpdate {
        expected: prior,
        likes_delta,
        unlikes_delta,
        user_entry,
        push_report: None,
    };

    match command {
        ReactionCommand::Like => match prior {
            Some(UserAction::Like) => Err(ReactionError::AlreadyActed {
                user_id: user_id.to_string(),
                action: UserAction::Like,
            }),
            Some(UserAction::Unlike) => Ok(update(1, -1, UserEntry::Set(UserAction::Like))),
            None | Some(UserAction::Report) => Ok(update(1, 0, UserEntry::Set(UserAction::Like))),
        },
        ReactionCommand::Unlike => match prior {
            // A second unlike takes the dislike back.
            Some(UserAction::Unlike) => Ok(update(0, -1, UserEntry::Remove)),
            Some(UserAction::Like) => Ok(update(-1, 1, UserEntry::Set(UserAction::Unlike))),
            None | Some(UserAction::Report) => {
                Ok(update(0, 1, UserEntry::Set(UserAction::Unlike)))
            }
        },
        ReactionCommand::Report { text } => {
            if reactions.has_report_from(user_id) {
                return Err(ReactionError::DuplicateReport(user_id.to_string()));
            }

            let (likes_delta, unlikes_delta) = match (policy, prior) {
                (ReportPolicy::Retract, Some(UserAction::Like)) => (-1, 0),
                (ReportPolicy::Retract, Some(UserAction::Unlike)) => (0, -1),
                _ => (0, 0),
            };

            Ok(ReactionUpdate {
                push_report: Some(ReportEntry {
                    report_text: text.clone(),
                    reported_by: user_id.to_string(),
                    reported_at: reported_at.to_string(),
                    fixed: false,
                }),
                ..update(likes_delta, unlikes_delta, UserEntry::Set(UserAction::Report))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2024-05-01T12:00:00+00:00";

    #[test]
    fn test_report_policy_parses_setting_names() {
        assert_eq!("retract".parse::<ReportPolicy>().unwrap(), ReportPolicy::Retract);
        assert_eq!("OVERWRITE".parse::<ReportPolicy>().unwrap(), ReportPolicy::Overwrite);
        assert!("ignore".parse::<ReportPolicy>().is_err());
    }

    fn state(entries: &[(&str, UserAction)]) -> ContentReactions {
        let mut reactions = ContentReactions::default();
        for (user, action) in entries {
            reactions.users.insert(user.to_string(), *action);
            match action {
                UserAction::Like => reactions.likes += 1,
                UserAction::Unlike => reactions.unlikes += 1,
                UserAction::Report => {}
            }
        }
        reactions
    }

    fn plan(command: &ReactionCommand, reactions: &ContentReactions) -> Result<ReactionUpdate, ReactionError> {
        plan_update(command, "u1", reactions, ReportPolicy::Overwrite, NOW)
    }

    #[test]
    fn test_parse_valid_actions() {
        assert_eq!(ReactionCommand::parse("like", None).unwrap(), ReactionCommand::Like);
        assert_eq!(ReactionCommand::parse(" unlike ", None).unwrap(), ReactionCommand::Unlike);
        assert_eq!(
            ReactionCommand::parse("report", Some("  spam  ")).unwrap(),
            ReactionCommand::Report {
                text: "spam".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        assert!(matches!(
            ReactionCommand::parse("love", None),
            Err(ReactionError::InvalidAction(ref a)) if a == "love"
        ));
        assert!(matches!(
            ReactionCommand::parse("", None),
            Err(ReactionError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_parse_report_requires_text() {
        assert!(matches!(
            ReactionCommand::parse("report", None),
            Err(ReactionError::MissingReportText)
        ));
        assert!(matches!(
            ReactionCommand::parse("report", Some("   ")),
            Err(ReactionError::MissingReportText)
        ));
    }

    #[test]
    fn test_like_transitions() {
        let fresh = plan(&ReactionCommand::Like, &state(&[])).unwrap();
        assert_eq!((fresh.likes_delta, fresh.unlikes_delta), (1, 0));
        assert_eq!(fresh.expected, None);
        assert_eq!(fresh.user_entry, UserEntry::Set(UserAction::Like));

        let flip = plan(&ReactionCommand::Like, &state(&[("u1", UserAction::Unlike)])).unwrap();
        assert_eq!((flip.likes_delta, flip.unlikes_delta), (1, -1));
        assert_eq!(flip.expected, Some(UserAction::Unlike));

        let after_report =
            plan(&ReactionCommand::Like, &state(&[("u1", UserAction::Report)])).unwrap();
        assert_eq!((after_report.likes_delta, after_report.unlikes_delta), (1, 0));

        let repeat = plan(&ReactionCommand::Like, &state(&[("u1", UserAction::Like)]));
        assert!(matches!(repeat, Err(ReactionError::AlreadyActed { .. })));
    }

    #[test]
    fn test_unlike_transitions() {
        let fresh = plan(&ReactionCommand::Unlike, &state(&[])).unwrap();
        assert_eq!((fresh.likes_delta, fresh.unlikes_delta), (0, 1));

        let flip = plan(&ReactionCommand::Unlike, &state(&[("u1", UserAction::Like)])).unwrap();
        assert_eq!((flip.likes_delta, flip.unlikes_delta), (-1, 1));
        assert_eq!(flip.user_entry, UserEntry::Set(UserAction::Unlike));

        let toggle_off =
            plan(&ReactionCommand::Unlike, &state(&[("u1", UserAction::Unlike)])).unwrap();
        assert_eq!((toggle_off.likes_delta, toggle_off.unlikes_delta), (0, -1));
        assert_eq!(toggle_off.user_entry, UserEntry::Remove);
    }

    #[test]
    fn test_report_overwrites_entry_without_touching_counters() {
        let report = ReactionCommand::Report {
            text: "spam".to_string(),
        };
        let update = plan(&report, &state(&[("u1", UserAction::Like)])).unwrap();
        assert_eq!((update.likes_delta, update.unlikes_delta), (0, 0));
        assert_eq!(update.user_entry, UserEntry::Set(UserAction::Report));
        let pushed = update.push_report.unwrap();
        assert_eq!(pushed.reported_by, "u1");
        assert_eq!(pushed.reported_at, NOW);
        assert!(!pushed.fixed);
    }

    #[test]
    fn test_report_retract_policy_withdraws_vote() {
        let report = ReactionCommand::Report {
            text: "spam".to_string(),
        };
        let liked = state(&[("u1", UserAction::Like)]);
        let update = plan_update(&report, "u1", &liked, ReportPolicy::Retract, NOW).unwrap();
        assert_eq!((update.likes_delta, update.unlikes_delta), (-1, 0));

        let unliked = state(&[("u1", UserAction::Unlike)]);
        let update = plan_update(&report, "u1", &unliked, ReportPolicy::Retract, NOW).unwrap();
        assert_eq!((update.likes_delta, update.unlikes_delta), (0, -1));
    }

    #[test]
    fn test_duplicate_report_rejected() {
        let mut reactions = state(&[("u1", UserAction::Report)]);
        reactions.reports.push(ReportEntry {
            report_text: "first".to_string(),
            reported_by: "u1".to_string(),
            reported_at: NOW.to_string(),
            fixed: false,
        });
        let again = ReactionCommand::Report {
            text: "second".to_string(),
        };
        assert!(matches!(
            plan(&again, &reactions),
            Err(ReactionError::DuplicateReport(ref u)) if u == "u1"
        ));
    }
}
