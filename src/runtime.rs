//! Runtime for executing conversations
//!
//! A conversation is built from a `ConversationConfig` and driven by a
//! `ConversationScheduler`. Nothing here is shared between conversations.

mod executor;
mod stream;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationScheduler;
pub use stream::ConversationStream;

use crate::participant::{Participant, ParticipantError};
use crate::state_machine::TransitionError;
use crate::termination::{StopReason, TerminationCondition};
use crate::transcript::{Transcript, TranscriptError};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_TOOL_CALLS_PER_TURN: u32 = 5;

/// Everything needed to run one conversation
#[derive(Clone)]
pub struct ConversationConfig {
    /// Speaking order, fixed for the life of the conversation
    pub participants: Vec<Arc<dyn Participant>>,
    pub termination: TerminationCondition,
    pub max_tool_calls_per_turn: u32,
    pub cancel: CancellationToken,
}

impl ConversationConfig {
    pub fn new(participants: Vec<Arc<dyn Participant>>, termination: TerminationCondition) -> Self {
        Self {
            participants,
            termination,
            max_tool_calls_per_turn: DEFAULT_MAX_TOOL_CALLS_PER_TURN,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_max_tool_calls_per_turn(mut self, limit: u32) -> Self {
        self.max_tool_calls_per_turn = limit;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn validate(&self) -> Result<(), ConversationError> {
        if self.participants.is_empty() {
            return Err(ConversationError::InvalidConfig(
                "at least one participant is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for participant in &self.participants {
            let id = participant.id();
            if id.is_task() {
                return Err(ConversationError::InvalidConfig(format!(
                    "participant id '{id}' is reserved for the initial task"
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(ConversationError::InvalidConfig(format!(
                    "duplicate participant id '{id}'"
                )));
            }
        }

        self.termination
            .validate()
            .map_err(ConversationError::InvalidConfig)
    }
}

impl std::fmt::Debug for ConversationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.participants.iter().map(|p| p.id().as_str()).collect();
        f.debug_struct("ConversationConfig")
            .field("participants", &ids)
            .field("termination", &self.termination)
            .field("max_tool_calls_per_turn", &self.max_tool_calls_per_turn)
            .finish_non_exhaustive()
    }
}

/// Final result of a conversation
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub transcript: Transcript,
    pub stop_reason: StopReason,
    /// Set when the conversation ended because a participant failed
    pub failure: Option<ParticipantError>,
}

/// Errors returned instead of an outcome
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("invalid conversation config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("conversation task aborted: {0}")]
    Aborted(String),
}

/// Run a conversation to completion
pub async fn run_conversation(
    task: impl Into<String>,
    config: ConversationConfig,
) -> Result<ConversationOutcome, ConversationError> {
    let mut scheduler = ConversationScheduler::new(config)?;
    scheduler.run(task).await
}
