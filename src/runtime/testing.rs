//! Mock implementations for testing
//!
//! These mocks let conversations run end to end without a model or network.

use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, LlmService, Usage};
use crate::participant::{Action, Participant, ParticipantError, ToolCallRequest};
use crate::tools::{ArgType, FunctionTool, ToolBodyError, ToolParam, ToolRegistry};
use crate::transcript::{ParticipantId, Transcript};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        content: vec![ContentBlock::text(text)],
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

pub fn tool_use_response(name: &str, input: Value) -> LlmResponse {
    LlmResponse {
        content: vec![ContentBlock::tool_use("call_mock", name, input)],
        usage: Usage::default(),
    }
}

// ============================================================================
// Scripted Participant
// ============================================================================

/// Participant that plays back queued actions, then says nothing
pub struct ScriptedParticipant {
    id: ParticipantId,
    script: Mutex<VecDeque<Action>>,
    tools: Option<ToolRegistry>,
    /// Transcript length at each call to `act`
    pub seen: Mutex<Vec<usize>>,
}

impl ScriptedParticipant {
    pub fn new(id: &str) -> Self {
        Self {
            id: ParticipantId::new(id),
            script: Mutex::new(VecDeque::new()),
            tools: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn says(self, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Action::utterance(text));
        self
    }

    pub fn calls(self, tool_name: &str, arguments: Value) -> Self {
        let arguments = arguments.as_object().cloned().unwrap_or_default();
        self.script
            .lock()
            .unwrap()
            .push_back(Action::ToolCall(ToolCallRequest::new(tool_name, arguments)));
        self
    }

    pub fn act_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Participant for ScriptedParticipant {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    fn tools(&self) -> Option<&ToolRegistry> {
        self.tools.as_ref()
    }

    async fn act(&self, history: &Transcript) -> Result<Action, ParticipantError> {
        self.seen.lock().unwrap().push(history.len());
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Action::utterance("")))
    }
}

/// Participant that trips a cancellation token, then acts anyway
pub struct CancellingParticipant {
    id: ParticipantId,
    token: CancellationToken,
    action: Action,
    tools: Option<ToolRegistry>,
}

impl CancellingParticipant {
    pub fn new(id: &str, token: CancellationToken) -> Self {
        Self {
            id: ParticipantId::new(id),
            token,
            action: Action::utterance("stopping here"),
            tools: None,
        }
    }

    /// Call `tool_name` from `tools` instead of speaking
    pub fn calling(mut self, tools: ToolRegistry, tool_name: &str, arguments: Value) -> Self {
        let arguments = arguments.as_object().cloned().unwrap_or_default();
        self.action = Action::ToolCall(ToolCallRequest::new(tool_name, arguments));
        self.tools = Some(tools);
        self
    }
}

#[async_trait]
impl Participant for CancellingParticipant {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    fn tools(&self) -> Option<&ToolRegistry> {
        self.tools.as_ref()
    }

    async fn act(&self, _history: &Transcript) -> Result<Action, ParticipantError> {
        self.token.cancel();
        Ok(self.action.clone())
    }
}

// ============================================================================
// Tools
// ============================================================================

/// Tool that returns `output` and counts its runs
pub fn counting_tool(name: &str, output: &str, runs: Arc<AtomicUsize>) -> FunctionTool {
    let output = output.to_string();
    FunctionTool::new(
        name,
        format!("Mock {name}"),
        vec![
            ToolParam::required("start", ArgType::String, "Start date"),
            ToolParam::required("end", ArgType::String, "End date"),
        ],
        move |_args: Map<String, Value>| {
            let output = output.clone();
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ToolBodyError>(output)
            }
        },
    )
}

/// Tool whose body always fails
pub fn failing_tool(name: &str) -> FunctionTool {
    FunctionTool::new(name, "Always fails", vec![], |_| async {
        Err::<String, ToolBodyError>("upstream unavailable".into())
    })
}
