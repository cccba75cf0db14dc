//! Model-backed participant

use super::{Action, Participant, ParticipantError, ToolCallRequest};
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, LlmService};
use crate::tools::{Tool, ToolError, ToolRegistry};
use crate::transcript::{Entry, ParticipantId, Transcript};
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Participant that asks a model what to say next
pub struct AgentParticipant {
    id: ParticipantId,
    system_instruction: String,
    llm: Arc<dyn LlmService>,
    tools: ToolRegistry,
    max_tokens: u32,
}

impl AgentParticipant {
    pub fn new(
        id: impl Into<ParticipantId>,
        system_instruction: impl Into<String>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        Self {
            id: id.into(),
            system_instruction: system_instruction.into(),
            llm,
            tools: ToolRegistry::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools = self.tools.with_tool(tool);
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Render the shared transcript from this participant's point of view.
    ///
    /// Own utterances and tool traffic become assistant turns and tool
    /// blocks; everything said by others arrives as user text prefixed
    /// with the speaker's name.
    pub fn render_history(&self, history: &Transcript) -> Vec<LlmMessage> {
        let mut messages = Vec::new();
        let mut last_call: Option<(usize, &ParticipantId)> = None;

        for (index, entry) in history.iter().enumerate() {
            match entry {
                Entry::Utterance { source, text } if *source == self.id => {
                    messages.push(LlmMessage::assistant(vec![ContentBlock::text(text)]));
                }
                Entry::Utterance { source, text } => {
                    if !text.trim().is_empty() {
                        messages.push(LlmMessage::user(vec![ContentBlock::text(format!(
                            "[{source}]: {text}"
                        ))]));
                    }
                }
                Entry::ToolCall {
                    source,
                    tool_name,
                    arguments,
                } => {
                    last_call = Some((index, source));
                    if *source == self.id {
                        messages.push(LlmMessage::assistant(vec![ContentBlock::tool_use(
                            call_id(index),
                            tool_name,
                            serde_json::Value::Object(arguments.clone()),
                        )]));
                    }
                }
                Entry::ToolResult { tool_name, outcome } => match last_call.take() {
                    Some((call_index, source)) if *source == self.id => {
                        messages.push(LlmMessage::user(vec![ContentBlock::tool_result(
                            call_id(call_index),
                            outcome.content(),
                            !outcome.is_success(),
                        )]));
                    }
                    Some((_, source)) => {
                        messages.push(LlmMessage::user(vec![ContentBlock::text(format!(
                            "[{source}] {tool_name} result: {}",
                            outcome.content()
                        ))]));
                    }
                    None => {}
                },
                Entry::StopSignal { .. } => {}
            }
        }

        messages
    }

    fn interpret(&self, response: &LlmResponse) -> Action {
        if let Some((_, name, input)) = response.tool_uses().into_iter().next() {
            if !self.tools.contains(name) {
                tracing::warn!(participant = %self.id, tool = %name, "Model requested unknown tool");
                let error = ToolError::UnknownTool {
                    name: name.to_string(),
                };
                return Action::Utterance(format!("Error: {error}"));
            }
            let arguments = input.as_object().cloned().unwrap_or_default();
            return Action::ToolCall(ToolCallRequest::new(name, arguments));
        }

        Action::Utterance(response.text())
    }
}

fn call_id(index: usize) -> String {
    format!("call_{index}")
}

#[async_trait]
impl Participant for AgentParticipant {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    fn tools(&self) -> Option<&ToolRegistry> {
        Some(&self.tools)
    }

    async fn act(&self, history: &Transcript) -> Result<Action, ParticipantError> {
        let request = LlmRequest {
            system: self.system_instruction.clone(),
            messages: self.render_history(history),
            tools: self.tools.definitions(),
            max_tokens: Some(self.max_tokens),
        };

        tracing::debug!(
            participant = %self.id,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting model turn"
        );

        let response = self.llm.complete(&request).await?;
        Ok(self.interpret(&response))
    }
}
