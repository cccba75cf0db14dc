//! Scheduler state types

use crate::participant::ToolCallRequest;
use crate::termination::{StopReason, TerminationCondition};
use crate::transcript::ParticipantId;

/// Where the conversation is in its loop
#[derive(Debug, Clone, PartialEq)]
pub enum ConvState {
    /// Waiting on `speaker` to act
    Running {
        speaker: usize,
        turns: u32,
        /// Tool calls already made in this turn
        tool_calls: u32,
    },

    /// `speaker` asked for a tool; waiting for its result
    AwaitingTool {
        speaker: usize,
        turns: u32,
        tool_calls: u32,
        call: ToolCallRequest,
    },

    /// Terminal. Nothing else happens.
    Stopped { reason: StopReason, turns: u32 },
}

impl ConvState {
    /// First participant, no turns taken
    pub fn initial() -> Self {
        ConvState::Running {
            speaker: 0,
            turns: 0,
            tool_calls: 0,
        }
    }

    pub fn turns(&self) -> u32 {
        match self {
            ConvState::Running { turns, .. }
            | ConvState::AwaitingTool { turns, .. }
            | ConvState::Stopped { turns, .. } => *turns,
        }
    }

    pub fn speaker(&self) -> Option<usize> {
        match self {
            ConvState::Running { speaker, .. } | ConvState::AwaitingTool { speaker, .. } => {
                Some(*speaker)
            }
            ConvState::Stopped { .. } => None,
        }
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            ConvState::Stopped { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConvState::Stopped { .. })
    }
}

/// Fixed facts about a conversation that transitions consult
#[derive(Debug, Clone)]
pub struct ConvContext {
    /// Rotation order, fixed at construction
    pub participant_ids: Vec<ParticipantId>,
    pub termination: TerminationCondition,
    pub max_tool_calls_per_turn: u32,
}

impl ConvContext {
    pub fn new(
        participant_ids: Vec<ParticipantId>,
        termination: TerminationCondition,
        max_tool_calls_per_turn: u32,
    ) -> Self {
        Self {
            participant_ids,
            termination,
            max_tool_calls_per_turn,
        }
    }

    pub fn next_speaker(&self, speaker: usize) -> usize {
        (speaker + 1) % self.participant_ids.len().max(1)
    }

    pub fn participant(&self, speaker: usize) -> Option<&ParticipantId> {
        self.participant_ids.get(speaker)
    }
}
