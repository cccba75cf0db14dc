//! LLM provider abstraction
//!
//! Agents talk to models only through `LlmService`, so tests can swap in
//! scripted clients.

mod config;
mod error;
mod openai;
mod types;

pub use config::LlmConfig;
pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAiCompatService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// A chat model that agents ask for their next turn
#[async_trait]
pub trait LlmService: Send + Sync {
    /// One request per agent step; no retries happen behind this call
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Reports each agent step's model call: latency, history size, token
/// usage and whether the model asked for a tool.
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => {
                let tool_uses = response.tool_uses();
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration_ms,
                    messages = request.messages.len(),
                    offered_tools = request.tools.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    requested_tool = tool_uses.first().map(|(_, name, _)| *name),
                    "Model turn completed"
                );
            }
            Err(e) => tracing::error!(
                model = %self.model_id,
                duration_ms = %duration_ms,
                messages = request.messages.len(),
                kind = ?e.kind,
                error = %e.message,
                "Model turn failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{text_response, MockLlmService};

    fn request() -> LlmRequest {
        LlmRequest {
            system: "sys".to_string(),
            messages: vec![LlmMessage::user(vec![ContentBlock::text("[User]: hi")])],
            tools: vec![],
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_logging_service_passes_results_through() {
        let mock = Arc::new(MockLlmService::new("mock-model"));
        mock.queue_response(text_response("hello"));
        mock.queue_error(LlmError::auth("bad key"));
        let service = LoggingService::new(mock.clone());

        assert_eq!(service.model_id(), "mock-model");
        let response = service.complete(&request()).await.unwrap();
        assert_eq!(response.text(), "hello");
        let err = service.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert_eq!(mock.recorded_requests().len(), 2);
    }
}
