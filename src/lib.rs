//! Colloquy - round-robin multi-agent conversations with tool calls
//!
//! Participants take turns in a fixed order, reading one shared transcript.
//! A turn ends when the speaker says something; tool calls made along the
//! way are executed by the scheduler and recorded without ending the turn.
//! The conversation stops on a configured phrase, a turn limit,
//! cancellation, or a participant failure.

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod llm;
pub mod participant;
pub mod runtime;
pub mod state_machine;
pub mod system_prompt;
pub mod termination;
pub mod tools;
pub mod transcript;

pub use participant::{
    Action, AgentParticipant, Participant, ParticipantError, ProxyParticipant, ProxyPolicy,
};
pub use runtime::{
    run_conversation, ConversationConfig, ConversationError, ConversationOutcome,
    ConversationScheduler, ConversationStream,
};
pub use termination::{StopReason, TerminationCondition};
pub use transcript::{Entry, ParticipantId, ToolOutcome, Transcript};
