use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use remark_core::ids::ToolCallId;
use remark_core::messages::ChatMessage;
use remark_core::model::{ModelEvent, ToolCallRequest};

use crate::agent::AgentDefinition;
use crate::error::EngineError;

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the tool-calling loop.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Hard ceiling on tool rounds per request. A model can request
    /// tools indefinitely; this bound guarantees termination anyway.
    pub max_tool_rounds: u32,
    pub tool_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// Progress events the loop forwards to whoever is streaming the
/// response. Text deltas become wire chunks; tool events are for
/// logging only.
#[derive(Clone, Debug)]
pub enum LoopEvent {
    TextDelta { delta: String },
    ToolStart { id: ToolCallId, name: String },
    ToolEnd { id: ToolCallId, duration_ms: u64 },
}

/// Drives model → tool → model cycles to a final answer.
///
/// An explicit bounded iteration, not recursion: each round invokes
/// the model once and dispatches at most one tool call. The
/// conversation only ever grows — tool results are appended, never
/// substituted.
pub struct ChatRunner {
    agent: Arc<AgentDefinition>,
    config: RunnerConfig,
}

impl ChatRunner {
    pub fn new(agent: Arc<AgentDefinition>) -> Self {
        Self {
            agent,
            config: RunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the loop to completion. `Ok(())` means the model finished a
    /// textual answer; every delta was already forwarded through
    /// `events`. A closed `events` channel or a cancelled token means
    /// the client is gone and the loop aborts.
    #[instrument(skip_all, fields(agent = self.agent.name))]
    pub async fn run(
        &self,
        inbound: Vec<ChatMessage>,
        events: mpsc::Sender<LoopEvent>,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        let mut conversation = self.agent.seed_conversation(inbound);
        let descriptors = self.agent.registry.descriptors();
        let mut rounds: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Aborted);
            }

            let mut stream = self
                .agent
                .model
                .stream(&conversation, &descriptors)
                .await
                .map_err(EngineError::Model)?;

            let mut pending: Option<ToolCallRequest> = None;
            while let Some(event) = stream.next().await {
                if cancel.is_cancelled() {
                    return Err(EngineError::Aborted);
                }
                match event? {
                    ModelEvent::TextDelta { delta } => {
                        if events.send(LoopEvent::TextDelta { delta }).await.is_err() {
                            return Err(EngineError::Aborted);
                        }
                    }
                    ModelEvent::ToolCall(request) => {
                        // Stop consuming this model call; the rest of
                        // the exchange happens on a fresh invocation.
                        pending = Some(request);
                        break;
                    }
                    ModelEvent::Finished => return Ok(()),
                }
            }

            let Some(request) = pending else {
                return Err(EngineError::Internal(
                    "model stream ended without finishing".into(),
                ));
            };

            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                warn!(rounds, "tool-calling limit exceeded");
                return Err(EngineError::LimitExceeded(self.config.max_tool_rounds));
            }

            debug!(tool = %request.name, round = rounds, "dispatching tool call");
            if events
                .send(LoopEvent::ToolStart {
                    id: request.id.clone(),
                    name: request.name.clone(),
                })
                .await
                .is_err()
            {
                return Err(EngineError::Aborted);
            }

            let start = Instant::now();
            let result = tokio::select! {
                result = self.agent.registry.invoke(
                    &request.name,
                    &request.arguments,
                    self.config.tool_timeout,
                ) => result?,
                _ = cancel.cancelled() => return Err(EngineError::Aborted),
            };

            if events
                .send(LoopEvent::ToolEnd {
                    id: request.id.clone(),
                    duration_ms: start.elapsed().as_millis() as u64,
                })
                .await
                .is_err()
            {
                return Err(EngineError::Aborted);
            }

            let result_json = serde_json::to_string(&result)
                .map_err(|e| EngineError::Internal(format!("unserializable tool result: {e}")))?;
            conversation.push(ChatMessage::tool_call(&request.name, request.arguments));
            conversation.push(ChatMessage::tool_result(result_json));
        }
    }
}
