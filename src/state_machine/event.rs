//! Events fed into the scheduler's state machine

use crate::participant::{Action, ParticipantError};
use crate::transcript::ToolOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The current speaker produced an action
    Acted { action: Action },

    /// The current speaker could not act
    ParticipantFailed { error: ParticipantError },

    /// The pending tool call finished, successfully or not
    ToolCompleted { outcome: ToolOutcome },

    /// The caller asked the conversation to stop
    Cancel,
}
