use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;
use crate::messages::ChatMessage;
use crate::tools::ToolDescriptor;

/// A tool invocation requested by the model. `arguments` is raw JSON
/// straight from the model; it is validated against the tool's input
/// schema before anything executes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Events yielded while a model call streams.
///
/// TextDelta* and at most one ToolCall, then Finished. A ToolCall ends
/// the useful part of the stream — the caller stops consuming and
/// dispatches the tool instead.
#[derive(Clone, Debug)]
pub enum ModelEvent {
    TextDelta { delta: String },
    ToolCall(ToolCallRequest),
    Finished,
}

/// Failure of the underlying model call. An `Err` item terminates the
/// event stream; a fresh call starts a fresh stream.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(String),
    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed model response: {0}")]
    Decode(String),
}

impl ModelError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Api { .. } => "api",
            Self::Decode(_) => "decode",
        }
    }
}

pub type ModelEventStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, ModelError>> + Send>>;

/// The language-model boundary. Implementations own transport and wire
/// format; callers see only the conversation in and events out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    /// Start one model call over the given conversation with the given
    /// tools available. The returned stream is finite and not
    /// resumable; to continue the exchange, call `stream` again with
    /// the grown conversation.
    async fn stream(
        &self,
        conversation: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelEventStream, ModelError>;
}
