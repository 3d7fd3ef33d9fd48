use remark_core::model::ModelError;
use remark_core::tools::ToolError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("tool-calling limit exceeded after {0} rounds")]
    LimitExceeded(u32),

    #[error("request aborted")]
    Aborted,

    #[error("{0}")]
    Internal(String),
}
