//! Termination conditions
//!
//! Conditions are evaluated after every utterance a participant produces,
//! never after tool calls or tool results.

use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Why a conversation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The latest utterance contained the configured phrase
    ContentMatch,
    /// The configured number of turns has been taken
    TurnLimit,
    /// The caller cancelled the conversation
    Cancelled,
    /// A participant could not produce a turn
    ParticipantFailure,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::ContentMatch => "content_match",
            StopReason::TurnLimit => "turn_limit",
            StopReason::Cancelled => "cancelled",
            StopReason::ParticipantFailure => "participant_failure",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composable stopping predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCondition {
    /// Stop when the latest utterance contains `needle`
    ContentMatch {
        needle: String,
        case_insensitive: bool,
    },
    /// Stop once this many turns have been taken
    TurnLimit(u32),
    /// Stop when any child condition fires
    Any(Vec<TerminationCondition>),
}

impl TerminationCondition {
    pub fn content_match(needle: impl Into<String>, case_insensitive: bool) -> Self {
        TerminationCondition::ContentMatch {
            needle: needle.into(),
            case_insensitive,
        }
    }

    pub fn turn_limit(max_turns: u32) -> Self {
        TerminationCondition::TurnLimit(max_turns)
    }

    /// Evaluate against a transcript whose latest utterance was just appended.
    ///
    /// The seed task never satisfies a content match.
    pub fn should_stop(&self, history: &Transcript, turns_taken: u32) -> Option<StopReason> {
        let latest = history
            .last_utterance()
            .filter(|(source, _)| !source.is_task())
            .map(|(_, text)| text);
        self.evaluate(latest, turns_taken)
    }

    /// Content matches take priority over turn limits, whatever the nesting order.
    pub fn evaluate(&self, latest_utterance: Option<&str>, turns_taken: u32) -> Option<StopReason> {
        if latest_utterance.is_some_and(|text| self.matches_content(text)) {
            Some(StopReason::ContentMatch)
        } else if self.limit_reached(turns_taken) {
            Some(StopReason::TurnLimit)
        } else {
            None
        }
    }

    fn matches_content(&self, text: &str) -> bool {
        match self {
            TerminationCondition::ContentMatch {
                needle,
                case_insensitive: true,
            } => text.to_lowercase().contains(&needle.to_lowercase()),
            TerminationCondition::ContentMatch { needle, .. } => text.contains(needle.as_str()),
            TerminationCondition::TurnLimit(_) => false,
            TerminationCondition::Any(children) => {
                children.iter().any(|child| child.matches_content(text))
            }
        }
    }

    fn limit_reached(&self, turns_taken: u32) -> bool {
        match self {
            TerminationCondition::ContentMatch { .. } => false,
            TerminationCondition::TurnLimit(max_turns) => turns_taken >= *max_turns,
            TerminationCondition::Any(children) => {
                children.iter().any(|child| child.limit_reached(turns_taken))
            }
        }
    }

    /// Reject conditions that could never be meaningful
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TerminationCondition::ContentMatch { needle, .. } if needle.is_empty() => {
                Err("content match needs a non-empty phrase".to_string())
            }
            TerminationCondition::TurnLimit(0) => Err("turn limit must be at least 1".to_string()),
            TerminationCondition::Any(children) if children.is_empty() => {
                Err("combined condition has no members".to_string())
            }
            TerminationCondition::Any(children) => {
                children.iter().try_for_each(TerminationCondition::validate)
            }
            TerminationCondition::ContentMatch { .. } | TerminationCondition::TurnLimit(_) => {
                Ok(())
            }
        }
    }
}

impl BitOr for TerminationCondition {
    type Output = TerminationCondition;

    fn bitor(self, rhs: Self) -> Self::Output {
        let mut children = match self {
            TerminationCondition::Any(children) => children,
            other => vec![other],
        };
        match rhs {
            TerminationCondition::Any(more) => children.extend(more),
            other => children.push(other),
        }
        TerminationCondition::Any(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Entry;

    #[test]
    fn test_content_match_respects_case_policy() {
        let sensitive = TerminationCondition::content_match("thank you", false);
        assert_eq!(sensitive.evaluate(Some("Thank You!"), 1), None);
        assert_eq!(
            sensitive.evaluate(Some("ok, thank you"), 1),
            Some(StopReason::ContentMatch)
        );

        let insensitive = TerminationCondition::content_match("thank you", true);
        assert_eq!(
            insensitive.evaluate(Some("THANK YOU so much"), 1),
            Some(StopReason::ContentMatch)
        );
    }

    #[test]
    fn test_turn_limit_fires_at_ceiling() {
        let limit = TerminationCondition::turn_limit(3);
        assert_eq!(limit.evaluate(Some("hi"), 2), None);
        assert_eq!(limit.evaluate(Some("hi"), 3), Some(StopReason::TurnLimit));
        assert_eq!(limit.evaluate(None, 4), Some(StopReason::TurnLimit));
    }

    #[test]
    fn test_content_match_wins_on_final_turn_in_either_order() {
        let limit_first =
            TerminationCondition::turn_limit(2) | TerminationCondition::content_match("bye", false);
        let match_first =
            TerminationCondition::content_match("bye", false) | TerminationCondition::turn_limit(2);

        for condition in [limit_first, match_first] {
            assert_eq!(
                condition.evaluate(Some("ok bye"), 2),
                Some(StopReason::ContentMatch)
            );
            assert_eq!(
                condition.evaluate(Some("ok"), 2),
                Some(StopReason::TurnLimit)
            );
        }
    }

    #[test]
    fn test_bitor_flattens_nested_any() {
        let combined = TerminationCondition::turn_limit(1)
            | TerminationCondition::content_match("a", false)
            | TerminationCondition::content_match("b", false);
        match combined {
            TerminationCondition::Any(children) => assert_eq!(children.len(), 3),
            other => panic!("expected Any, got {other:?}"),
        }
    }

    #[test]
    fn test_should_stop_ignores_seed_task() {
        let condition = TerminationCondition::content_match("thank you", true);
        let mut history = Transcript::seeded("say thank you when done");
        assert_eq!(condition.should_stop(&history, 0), None);

        history
            .append(Entry::utterance("User", "great, thank you"))
            .unwrap();
        assert_eq!(
            condition.should_stop(&history, 1),
            Some(StopReason::ContentMatch)
        );
    }

    #[test]
    fn test_validate_rejects_degenerate_conditions() {
        assert!(TerminationCondition::turn_limit(0).validate().is_err());
        assert!(TerminationCondition::content_match("", true).validate().is_err());
        assert!(TerminationCondition::Any(vec![]).validate().is_err());
        assert!((TerminationCondition::turn_limit(1) | TerminationCondition::turn_limit(0))
            .validate()
            .is_err());
        assert!((TerminationCondition::turn_limit(10)
            | TerminationCondition::content_match("thank you", true))
        .validate()
        .is_ok());
    }
}
