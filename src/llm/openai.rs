//! `OpenAI`-compatible chat completions client
//!
//! Works against any endpoint that speaks the chat completions protocol,
//! including Gemini's compatibility layer.

use super::types::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat completions service implementation
pub struct OpenAiCompatService {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiCompatService {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }

    fn translate_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::new();

        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(request.system.clone()),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for msg in &request.messages {
            // Tool results become separate "tool" messages
            messages.extend(Self::translate_message(msg));
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| ChatTool {
                        r#type: "function".to_string(),
                        function: ChatFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        ChatRequest {
            model: self.model.clone(),
            messages,
            tools,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    fn translate_message(msg: &LlmMessage) -> Vec<ChatMessage> {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();

        for block in &msg.content {
            match block {
                ContentBlock::Text { text } => text_parts.push(text.clone()),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ChatToolCall {
                        id: id.clone(),
                        r#type: "function".to_string(),
                        function: ChatFunctionCall {
                            name: name.clone(),
                            arguments: serde_json::to_string(input)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    });
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => tool_results.push((tool_use_id.clone(), content.clone(), *is_error)),
            }
        }

        let mut messages = Vec::new();

        if !text_parts.is_empty() || !tool_calls.is_empty() {
            messages.push(ChatMessage {
                role: role.to_string(),
                content: (!text_parts.is_empty()).then(|| text_parts.join("\n")),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            });
        }

        for (tool_use_id, content, is_error) in tool_results {
            messages.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(if is_error {
                    format!("Error: {content}")
                } else {
                    content
                }),
                tool_calls: None,
                tool_call_id: Some(tool_use_id),
            });
        }

        if messages.is_empty() {
            messages.push(ChatMessage {
                role: role.to_string(),
                content: Some(String::new()),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        messages
    }

    fn normalize_response(resp: ChatResponse) -> Result<LlmResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text });
            }
        }

        for tc in choice.message.tool_calls.unwrap_or_default() {
            if tc.function.name.is_empty() {
                continue;
            }
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    arguments = %tc.function.arguments,
                    "Failed to parse tool call arguments"
                );
                serde_json::json!({})
            });
            content.push(ContentBlock::ToolUse {
                id: tc.id,
                name: tc.function.name,
                input,
            });
        }

        let usage = resp.usage.unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage: Usage {
                input_tokens: u64::from(usage.prompt_tokens),
                output_tokens: u64::from(usage.completion_tokens),
            },
        })
    }

    fn classify_status(status: StatusCode, body: &str) -> LlmError {
        let message = serde_json::from_str::<ChatErrorResponse>(body)
            .map(|resp| resp.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status.as_u16() {
            401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
            408 | 504 => LlmError::timeout(format!("Upstream timeout: {message}")),
            429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
            400 => LlmError::invalid_request(format!("Invalid request: {message}")),
            500..=599 => LlmError::server_error(format!("Server error: {message}")),
            _ => LlmError::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

#[async_trait]
impl LlmService for OpenAiCompatService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let chat_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::timeout(format!("Timed out reading response: {e}"))
            } else {
                LlmError::network(format!("Failed to read response: {e}"))
            }
        })?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        let chat_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(chat_response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Chat completions wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ChatFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatErrorResponse {
    error: ChatError,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}
