//! Effects produced by state transitions

use crate::participant::ToolCallRequest;
use crate::termination::StopReason;
use crate::transcript::Entry;

/// Work for the executor to carry out after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append an entry to the transcript
    Append(Entry),

    /// Ask a participant for its next action
    InvokeParticipant { speaker: usize },

    /// Run a tool on behalf of a participant
    ExecuteTool {
        speaker: usize,
        call: ToolCallRequest,
    },
}

impl Effect {
    pub fn stop(reason: StopReason) -> Self {
        Effect::Append(Entry::StopSignal { reason })
    }
}
