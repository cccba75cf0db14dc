//! Conversation scheduler: executes state machine effects

use super::{ConversationConfig, ConversationError, ConversationOutcome, ConversationStream};
use crate::participant::{Participant, ParticipantError};
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event};
use crate::termination::StopReason;
use crate::tools::{ToolError, ToolInvoker};
use crate::transcript::{Entry, ToolOutcome, Transcript};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Drives one conversation from its seed task to a stop signal
pub struct ConversationScheduler {
    conversation_id: String,
    context: ConvContext,
    participants: Vec<Arc<dyn Participant>>,
    state: ConvState,
    transcript: Transcript,
    cancel: CancellationToken,
    failure: Option<ParticipantError>,
    /// Mirror of every appended entry, for streaming
    entry_tx: Option<mpsc::UnboundedSender<Entry>>,
}

impl ConversationScheduler {
    pub fn new(config: ConversationConfig) -> Result<Self, ConversationError> {
        config.validate()?;

        let context = ConvContext::new(
            config.participants.iter().map(|p| p.id().clone()).collect(),
            config.termination,
            config.max_tool_calls_per_turn,
        );

        Ok(Self {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            context,
            participants: config.participants,
            state: ConvState::initial(),
            transcript: Transcript::new(),
            cancel: config.cancel,
            failure: None,
            entry_tx: None,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn state(&self) -> &ConvState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Token that stops the conversation before its next step
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until a stop condition fires.
    ///
    /// Calling this again after the conversation stopped returns the same
    /// outcome and appends nothing.
    pub async fn run(
        &mut self,
        task: impl Into<String>,
    ) -> Result<ConversationOutcome, ConversationError> {
        if let Some(outcome) = self.outcome() {
            tracing::debug!(conv_id = %self.conversation_id, "Conversation already stopped");
            return Ok(outcome);
        }

        if self.transcript.is_empty() {
            self.append(Entry::task(task))?;
        }

        tracing::info!(
            conv_id = %self.conversation_id,
            participants = ?self.context.participant_ids,
            "Starting conversation"
        );

        let mut effects: Vec<Effect> = self.resume_effect().into_iter().collect();

        // Each transition yields at most one effect that produces an event
        loop {
            let mut next_event = None;
            for effect in effects {
                if let Some(event) = self.execute_effect(effect).await? {
                    next_event = Some(event);
                }
            }

            let Some(event) = next_event else { break };

            let result = transition(&self.state, &self.context, event)?;
            self.state = result.new_state;
            effects = result.effects;
        }

        let outcome = self.outcome().ok_or_else(|| {
            ConversationError::Aborted(format!("loop exited in state {:?}", self.state))
        })?;

        tracing::info!(
            conv_id = %self.conversation_id,
            reason = %outcome.stop_reason,
            turns = self.state.turns(),
            entries = self.transcript.len(),
            "Conversation stopped"
        );

        Ok(outcome)
    }

    /// Run in the background, yielding each entry as it is appended.
    ///
    /// Entries already in the transcript are replayed first.
    pub fn run_stream(mut self, task: impl Into<String>) -> ConversationStream {
        let (entry_tx, entry_rx) = mpsc::unbounded_channel();
        for entry in &self.transcript {
            let _ = entry_tx.send(entry.clone());
        }
        self.entry_tx = Some(entry_tx);

        let task = task.into();
        // The sender drops with the scheduler, which ends the stream
        let handle = tokio::spawn(async move {
            let mut scheduler = self;
            scheduler.run(task).await
        });

        ConversationStream::new(entry_rx, handle)
    }

    fn outcome(&self) -> Option<ConversationOutcome> {
        let stop_reason = self.state.stop_reason()?;
        Some(ConversationOutcome {
            transcript: self.transcript.clone(),
            stop_reason,
            failure: self.failure.clone(),
        })
    }

    /// The effect that continues from the current state
    fn resume_effect(&self) -> Option<Effect> {
        match &self.state {
            ConvState::AwaitingTool { speaker, call, .. } => Some(Effect::ExecuteTool {
                speaker: *speaker,
                call: call.clone(),
            }),
            ConvState::Running { speaker, .. } => {
                Some(Effect::InvokeParticipant { speaker: *speaker })
            }
            ConvState::Stopped { .. } => None,
        }
    }

    fn append(&mut self, entry: Entry) -> Result<(), ConversationError> {
        let appended = self.transcript.append(entry)?;
        if let Some(tx) = &self.entry_tx {
            let _ = tx.send(appended.clone());
        }
        Ok(())
    }

    fn participant(&self, speaker: usize) -> Result<Arc<dyn Participant>, ConversationError> {
        self.participants.get(speaker).cloned().ok_or_else(|| {
            ConversationError::Aborted(format!("no participant at position {speaker}"))
        })
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, ConversationError> {
        match effect {
            Effect::Append(entry) => {
                if let Entry::StopSignal { reason } = &entry {
                    if *reason == StopReason::Cancelled {
                        tracing::info!(conv_id = %self.conversation_id, "Conversation cancelled");
                    }
                }
                self.append(entry)?;
                Ok(None)
            }

            Effect::InvokeParticipant { speaker } => {
                if self.cancel.is_cancelled() {
                    return Ok(Some(Event::Cancel));
                }

                let participant = self.participant(speaker)?;
                tracing::debug!(
                    conv_id = %self.conversation_id,
                    participant = %participant.id(),
                    turn = self.state.turns() + 1,
                    "Invoking participant"
                );

                match participant.act(&self.transcript).await {
                    Ok(action) => Ok(Some(Event::Acted { action })),
                    Err(error) => {
                        tracing::warn!(
                            conv_id = %self.conversation_id,
                            participant = %participant.id(),
                            error = %error,
                            "Participant failed"
                        );
                        self.failure = Some(error.clone());
                        Ok(Some(Event::ParticipantFailed { error }))
                    }
                }
            }

            // Runs even when cancelled: the ToolCall is already recorded and
            // needs its result. Cancellation lands at the next participant step.
            Effect::ExecuteTool { speaker, call } => {
                let participant = self.participant(speaker)?;
                tracing::debug!(
                    conv_id = %self.conversation_id,
                    participant = %participant.id(),
                    tool = %call.tool_name,
                    "Executing tool call"
                );

                // A participant may only run tools from its own registry
                let result = match participant.tools() {
                    Some(registry) => {
                        ToolInvoker::invoke_from(registry, &call.tool_name, &call.arguments).await
                    }
                    None => Err(ToolError::UnknownTool {
                        name: call.tool_name.clone(),
                    }),
                };

                Ok(Some(Event::ToolCompleted {
                    outcome: ToolOutcome::from(result),
                }))
            }
        }
    }
}
