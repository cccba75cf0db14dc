//! Pure state transition function

use super::{ConvContext, ConvState, Effect, Event};
use crate::participant::{Action, ToolCallRequest};
use crate::termination::StopReason;
use crate::tools::ToolError;
use crate::transcript::{Entry, ParticipantId};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn prepend(mut self, effect: Effect) -> Self {
        self.effects.insert(0, effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Conversation already stopped ({0})")]
    AlreadyStopped(StopReason),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs. Transcript
/// appends and participant or tool calls are described as effects for
/// the executor.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (ConvState::Stopped { reason, .. }, _) => Err(TransitionError::AlreadyStopped(*reason)),

        // A recorded tool call always gets its result first, so cancellation
        // only lands between steps of a running turn
        (ConvState::Running { turns, .. }, Event::Cancel) => {
            Ok(stop(StopReason::Cancelled, *turns))
        }

        (ConvState::Running { turns, .. }, Event::ParticipantFailed { .. }) => {
            Ok(stop(StopReason::ParticipantFailure, *turns))
        }

        (
            ConvState::Running { speaker, turns, .. },
            Event::Acted {
                action: Action::Utterance(text),
            },
        ) => close_turn(context, *speaker, *turns, text),

        (
            ConvState::Running {
                speaker,
                turns,
                tool_calls,
            },
            Event::Acted {
                action: Action::ToolCall(call),
            },
        ) => {
            if *tool_calls >= context.max_tool_calls_per_turn {
                // The rejected call is never recorded: it would have no result
                let error = ToolError::BudgetExceeded {
                    limit: context.max_tool_calls_per_turn,
                };
                let fallback = format!("[{} not run: {error}]", call.tool_name);
                return close_turn(context, *speaker, *turns, fallback);
            }

            let source = speaker_id(context, *speaker)?;
            let ToolCallRequest {
                tool_name,
                arguments,
            } = &call;
            let entry = Entry::ToolCall {
                source,
                tool_name: tool_name.clone(),
                arguments: arguments.clone(),
            };

            Ok(TransitionResult::new(ConvState::AwaitingTool {
                speaker: *speaker,
                turns: *turns,
                tool_calls: tool_calls + 1,
                call: call.clone(),
            })
            .with_effect(Effect::Append(entry))
            .with_effect(Effect::ExecuteTool {
                speaker: *speaker,
                call,
            }))
        }

        (
            ConvState::AwaitingTool {
                speaker,
                turns,
                tool_calls,
                call,
            },
            Event::ToolCompleted { outcome },
        ) => Ok(TransitionResult::new(ConvState::Running {
            speaker: *speaker,
            turns: *turns,
            tool_calls: *tool_calls,
        })
        .with_effect(Effect::Append(Entry::ToolResult {
            tool_name: call.tool_name.clone(),
            outcome,
        }))
        .with_effect(Effect::InvokeParticipant { speaker: *speaker })),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} while {state:?}"
        ))),
    }
}

/// Record an utterance as the end of a turn, then stop or rotate
fn close_turn(
    context: &ConvContext,
    speaker: usize,
    turns: u32,
    text: String,
) -> Result<TransitionResult, TransitionError> {
    let source = speaker_id(context, speaker)?;
    let turns = turns + 1;
    let reason = context.termination.evaluate(Some(&text), turns);
    let utterance = Effect::Append(Entry::Utterance { source, text });

    if let Some(reason) = reason {
        return Ok(stop(reason, turns).prepend(utterance));
    }

    let next = context.next_speaker(speaker);
    Ok(TransitionResult::new(ConvState::Running {
        speaker: next,
        turns,
        tool_calls: 0,
    })
    .with_effect(utterance)
    .with_effect(Effect::InvokeParticipant { speaker: next }))
}

fn stop(reason: StopReason, turns: u32) -> TransitionResult {
    TransitionResult::new(ConvState::Stopped { reason, turns }).with_effect(Effect::stop(reason))
}

fn speaker_id(context: &ConvContext, speaker: usize) -> Result<ParticipantId, TransitionError> {
    context.participant(speaker).cloned().ok_or_else(|| {
        TransitionError::InvalidTransition(format!("no participant at position {speaker}"))
    })
}
