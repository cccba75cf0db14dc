//! Tools that participants can ask the scheduler to run
//!
//! Tools are stateless: all per-call input arrives as validated JSON
//! arguments, and each participant owns its own registry.

pub mod chart;
mod invoker;
pub mod market;

pub use chart::PlotPriceDataTool;
pub use invoker::ToolInvoker;
pub use market::FetchPriceDataTool;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by tool bodies
pub type ToolBodyError = Box<dyn std::error::Error + Send + Sync>;

/// Failures recorded in place of a tool's output
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("tool {tool} failed: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("tool call budget of {limit} per turn exhausted")]
    BudgetExceeded { limit: u32 },
}

/// JSON type expected for a tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ArgType {
    /// JSON schema type name
    pub fn schema_name(self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Number => "number",
            ArgType::Integer => "integer",
            ArgType::Boolean => "boolean",
            ArgType::Array => "array",
            ArgType::Object => "object",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Number => value.is_number(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Boolean => value.is_boolean(),
            ArgType::Array => value.is_array(),
            ArgType::Object => value.is_object(),
        }
    }
}

/// One entry of a tool's argument schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: String,
    pub ty: ArgType,
    pub required: bool,
    pub description: String,
}

impl ToolParam {
    pub fn required(name: impl Into<String>, ty: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            description: description.into(),
        }
    }
}

/// Tool definition advertised to a model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Trait for tools that participants can request
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a registry
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// Argument schema checked before every run
    fn parameters(&self) -> Vec<ToolParam>;

    /// JSON schema for tool input, derived from `parameters`
    fn input_schema(&self) -> Value {
        let params = self.parameters();
        let properties: Map<String, Value> = params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({ "type": p.ty.schema_name(), "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Execute the tool. Arguments have already been validated.
    async fn run(&self, arguments: Map<String, Value>) -> Result<String, ToolBodyError>;
}

type ToolBody =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<String, ToolBodyError>> + Send + Sync>;

/// Tool backed by an async closure
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Vec<ToolParam>,
    body: ToolBody,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParam>,
        body: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolBodyError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            body: Arc::new(move |args| Box::pin(body(args))),
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn parameters(&self) -> Vec<ToolParam> {
        self.parameters.clone()
    }

    async fn run(&self, arguments: Map<String, Value>) -> Result<String, ToolBodyError> {
        (self.body)(arguments).await
    }
}

/// Collection of tools owned by one participant
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!(tool = %tool.name(), "Replacing tool with duplicate name");
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool definitions for a model request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
