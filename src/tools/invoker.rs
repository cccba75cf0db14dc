//! Validated, panic-isolated tool execution

use super::{Tool, ToolError, ToolRegistry};
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

/// Runs tool bodies on behalf of the scheduler.
///
/// Every failure, including a panic inside the body, comes back as a
/// `ToolError` value. Bodies run exactly once per call.
pub struct ToolInvoker;

impl ToolInvoker {
    /// Check arguments against the tool's parameter schema
    pub fn validate(tool: &dyn Tool, arguments: &Map<String, Value>) -> Result<(), ToolError> {
        for param in tool.parameters() {
            match arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::InvalidArguments {
                        tool: tool.name().to_string(),
                        message: format!("missing required argument '{}'", param.name),
                    });
                }
                Some(value) if !value.is_null() && !param.ty.accepts(value) => {
                    return Err(ToolError::InvalidArguments {
                        tool: tool.name().to_string(),
                        message: format!(
                            "argument '{}' must be of type {}",
                            param.name,
                            param.ty.schema_name()
                        ),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate and execute a tool
    pub async fn invoke(
        tool: Arc<dyn Tool>,
        arguments: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        Self::validate(tool.as_ref(), arguments)?;

        let name = tool.name().to_string();
        let arguments = arguments.clone();
        let start = Instant::now();
        tracing::info!(tool = %name, "Executing tool");

        // The body runs in its own task so a panic surfaces as a JoinError
        let handle = tokio::spawn(async move {
            tool.run(arguments).await.map_err(|e| e.to_string())
        });

        let result = match handle.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(message)) => Err(ToolError::ExecutionFailed {
                tool: name.clone(),
                message,
            }),
            Err(join_error) if join_error.is_panic() => Err(ToolError::ExecutionFailed {
                tool: name.clone(),
                message: format!("panicked: {}", panic_message(&*join_error.into_panic())),
            }),
            Err(join_error) => Err(ToolError::ExecutionFailed {
                tool: name.clone(),
                message: join_error.to_string(),
            }),
        };

        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(output) => tracing::info!(
                tool = %name,
                duration_ms = %duration_ms,
                output_len = output.len(),
                "Tool completed"
            ),
            Err(e) => tracing::warn!(
                tool = %name,
                duration_ms = %duration_ms,
                error = %e,
                "Tool failed"
            ),
        }

        result
    }

    /// Resolve a tool by name in `registry`, then invoke it
    pub async fn invoke_from(
        registry: &ToolRegistry,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let tool = registry.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        Self::invoke(tool, arguments).await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
