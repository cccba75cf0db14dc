//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::transition::*;
use super::*;
use crate::participant::{Action, ParticipantError, ToolCallRequest};
use crate::termination::{StopReason, TerminationCondition};
use crate::tools::ToolError;
use crate::transcript::{Entry, ParticipantId, ToolOutcome};
use proptest::prelude::*;
use serde_json::Map;

// ============================================================================
// Test Helpers
// ============================================================================

const STOP_PHRASE: &str = "thank you";

fn test_context(participants: usize, max_turns: u32, budget: u32) -> ConvContext {
    ConvContext::new(
        (0..participants)
            .map(|i| ParticipantId::new(format!("p{i}")))
            .collect(),
        TerminationCondition::turn_limit(max_turns)
            | TerminationCondition::content_match(STOP_PHRASE, true),
        budget,
    )
}

fn appended_utterances(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Append(Entry::Utterance { .. })))
        .count()
}

fn is_stop_signal(effect: &Effect) -> bool {
    matches!(effect, Effect::Append(Entry::StopSignal { .. }))
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z ]{0,20}",
        1 => Just("Thank you, that helps".to_string()),
    ]
}

fn arb_outcome() -> impl Strategy<Value = ToolOutcome> {
    prop_oneof![
        "[a-z.]{1,12}".prop_map(ToolOutcome::Success),
        "[a-z ]{1,20}".prop_map(|message| ToolOutcome::Failure(ToolError::ExecutionFailed {
            tool: "fetch".to_string(),
            message,
        })),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        6 => arb_text().prop_map(|text| Event::Acted { action: Action::Utterance(text) }),
        3 => "[a-z]{3,8}".prop_map(|name| Event::Acted {
            action: Action::ToolCall(ToolCallRequest::new(name, Map::new())),
        }),
        3 => arb_outcome().prop_map(|outcome| Event::ToolCompleted { outcome }),
        1 => Just(Event::ParticipantFailed {
            error: ParticipantError::ModelUnavailable("down".to_string()),
        }),
        1 => Just(Event::Cancel),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Invariant 1: turns grow by exactly one per appended utterance and never
    // pass the configured limit
    #[test]
    fn test_prop_turns_count_utterances(
        participants in 1usize..5,
        max_turns in 1u32..12,
        budget in 0u32..4,
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let ctx = test_context(participants, max_turns, budget);
        let mut state = ConvState::initial();

        for event in events {
            let Ok(result) = transition(&state, &ctx, event) else { continue };
            let before = state.turns();
            let after = result.new_state.turns();
            let expected = before + u32::try_from(appended_utterances(&result.effects)).unwrap();
            prop_assert_eq!(after, expected);
            prop_assert!(after <= max_turns, "turns {} past limit {}", after, max_turns);
            state = result.new_state;
        }
    }

    // Invariant 2: a stop signal is emitted exactly when the machine stops,
    // and it is always the final effect
    #[test]
    fn test_prop_stop_signal_iff_stopped(
        participants in 1usize..5,
        max_turns in 1u32..12,
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let ctx = test_context(participants, max_turns, 2);
        let mut state = ConvState::initial();

        for event in events {
            let Ok(result) = transition(&state, &ctx, event) else { continue };
            let stops = result.effects.iter().filter(|e| is_stop_signal(e)).count();
            if result.new_state.is_terminal() {
                prop_assert_eq!(stops, 1);
                prop_assert!(result.effects.last().is_some_and(is_stop_signal));
            } else {
                prop_assert_eq!(stops, 0);
            }
            state = result.new_state;
        }
    }

    // Invariant 3: once stopped, every event is rejected
    #[test]
    fn test_prop_stopped_is_absorbing(
        participants in 1usize..5,
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let ctx = test_context(participants, 3, 2);
        let mut state = ConvState::initial();

        for event in events {
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    prop_assert!(!state.is_terminal(), "stopped state accepted an event");
                    state = result.new_state;
                }
                Err(TransitionError::AlreadyStopped(reason)) => {
                    prop_assert_eq!(state.stop_reason(), Some(reason));
                }
                Err(TransitionError::InvalidTransition(_)) => {
                    prop_assert!(!state.is_terminal());
                }
            }
        }
    }

    // Invariant 4: speaking passes the turn to the next participant in order,
    // tool traffic keeps it with the current one
    #[test]
    fn test_prop_rotation_is_cyclic(
        participants in 1usize..5,
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let ctx = test_context(participants, 50, 3);
        let mut state = ConvState::initial();

        for event in events {
            let Some(speaker) = state.speaker() else { break };
            let Ok(result) = transition(&state, &ctx, event) else { continue };
            if let Some(next) = result.new_state.speaker() {
                if appended_utterances(&result.effects) == 1 {
                    prop_assert_eq!(next, (speaker + 1) % participants);
                } else {
                    prop_assert_eq!(next, speaker);
                }
            }
            state = result.new_state;
        }
    }

    // Invariant 5: a turn never makes more tool calls than its budget
    #[test]
    fn test_prop_tool_budget_respected(
        budget in 0u32..4,
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let ctx = test_context(2, 50, budget);
        let mut state = ConvState::initial();

        for event in events {
            let Ok(result) = transition(&state, &ctx, event) else { continue };
            match &result.new_state {
                ConvState::Running { tool_calls, .. }
                | ConvState::AwaitingTool { tool_calls, .. } => {
                    prop_assert!(*tool_calls <= budget);
                }
                ConvState::Stopped { .. } => {}
            }
            state = result.new_state;
        }
    }

    // Invariant 6: with plain utterances only, the conversation ends by turn
    // limit on exactly the configured turn
    #[test]
    fn test_prop_turn_limit_exact(
        participants in 1usize..5,
        max_turns in 1u32..15
    ) {
        let ctx = test_context(participants, max_turns, 0);
        let mut state = ConvState::initial();
        let mut steps = 0;

        while !state.is_terminal() {
            let result = transition(&state, &ctx, Event::Acted {
                action: Action::Utterance("more please".to_string()),
            }).unwrap();
            state = result.new_state;
            steps += 1;
        }

        prop_assert_eq!(steps, max_turns);
        prop_assert_eq!(state, ConvState::Stopped { reason: StopReason::TurnLimit, turns: max_turns });
    }

    // Invariant 7: the stop phrase wins even on the final permitted turn
    #[test]
    fn test_prop_content_match_beats_turn_limit(max_turns in 1u32..10) {
        let ctx = test_context(3, max_turns, 0);
        let state = ConvState::Running {
            speaker: 0,
            turns: max_turns - 1,
            tool_calls: 0,
        };
        let result = transition(&state, &ctx, Event::Acted {
            action: Action::Utterance("THANK YOU".to_string()),
        }).unwrap();
        prop_assert_eq!(result.new_state.stop_reason(), Some(StopReason::ContentMatch));
    }
}
