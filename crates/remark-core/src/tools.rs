use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use remark_schema::{Schema, SchemaError};

/// Tool definition sent to the model as part of the available-tools set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Trait implemented by each registered tool.
///
/// Implementations only see arguments that already passed input-schema
/// validation, and their output is checked against the output schema
/// before it reaches the conversation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Schema;
    fn output_schema(&self) -> &Schema;

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema().to_json_schema(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(SchemaError),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("malformed tool output: {0}")]
    MalformedOutput(SchemaError),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}
