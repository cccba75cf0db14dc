//! Conversation participants
//!
//! A participant looks at the transcript and either says something or asks
//! for one of its own tools to be run. Model-backed agents and human proxies
//! sit behind the same trait.

mod agent;
mod proxy;

pub use agent::AgentParticipant;
pub use proxy::{ProxyParticipant, ProxyPolicy};

use crate::llm::{LlmError, LlmErrorKind};
use crate::tools::ToolRegistry;
use crate::transcript::{ParticipantId, Transcript};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A request to run one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What a participant produced for its step
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Utterance(String),
    ToolCall(ToolCallRequest),
}

impl Action {
    pub fn utterance(text: impl Into<String>) -> Self {
        Action::Utterance(text.into())
    }
}

/// Why a participant could not act. These end the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParticipantError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model timed out: {0}")]
    ModelTimeout(String),
    #[error("input failed: {0}")]
    Input(String),
}

impl From<LlmError> for ParticipantError {
    fn from(error: LlmError) -> Self {
        match error.kind {
            LlmErrorKind::Timeout => ParticipantError::ModelTimeout(error.message),
            _ => ParticipantError::ModelUnavailable(error.message),
        }
    }
}

#[async_trait]
pub trait Participant: Send + Sync {
    fn id(&self) -> &ParticipantId;

    /// Tools this participant may call. Calls to anything else are rejected.
    fn tools(&self) -> Option<&ToolRegistry> {
        None
    }

    /// Produce the next action given everything said so far
    async fn act(&self, history: &Transcript) -> Result<Action, ParticipantError>;
}
