use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use remark_core::ids::ToolCallId;
use remark_core::model::{ModelError, ModelEvent, ToolCallRequest};

/// Splits an SSE byte stream into `data:` payloads. Frames may arrive
/// split across arbitrary byte boundaries; bytes are buffered until a
/// complete line is available.
#[derive(Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the complete `data:` payloads found.
    /// Comment lines, `event:` lines, and blank separators are skipped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Parses OpenAI Chat Completions stream chunks into model events.
///
/// Text arrives as `delta.content` fragments. Tool calls arrive as
/// `delta.tool_calls` fragments (name once, arguments spread across
/// chunks), accumulated per wire `index` so parallel calls never mix,
/// and are only emitted once `finish_reason` confirms them.
pub struct ChunkParser {
    tool_calls: BTreeMap<u64, PendingToolCall>,
    terminated: bool,
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

impl Default for ChunkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkParser {
    pub fn new() -> Self {
        Self {
            tool_calls: BTreeMap::new(),
            terminated: false,
        }
    }

    /// Whether a `Finished` or `ToolCall` event has been emitted.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// Parse one `data:` payload, returning zero or more events.
    pub fn parse(&mut self, data: &str) -> Result<Vec<ModelEvent>, ModelError> {
        if data == "[DONE]" {
            return Ok(Vec::new());
        }

        let chunk: ChatChunk = serde_json::from_str(data)
            .map_err(|e| ModelError::Decode(format!("bad stream chunk: {e}")))?;

        let mut events = Vec::new();
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(events);
        };

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(ModelEvent::TextDelta { delta: content });
            }
        }

        for fragment in choice.delta.tool_calls.unwrap_or_default() {
            let pending = self
                .tool_calls
                .entry(fragment.index.unwrap_or(0))
                .or_default();
            if let Some(id) = fragment.id {
                pending.id = id;
            }
            if let Some(function) = fragment.function {
                if let Some(name) = function.name {
                    pending.name = name;
                }
                if let Some(arguments) = function.arguments {
                    pending.arguments_json.push_str(&arguments);
                }
            }
        }

        match choice.finish_reason.as_deref() {
            Some("tool_calls") => {
                // The loop dispatches one tool per round and re-asks
                // the model with the result, so only the lowest-index
                // call goes out; the rest are discarded.
                let mut calls = std::mem::take(&mut self.tool_calls);
                let (_, pending) = calls.pop_first().ok_or_else(|| {
                    ModelError::Decode("finish_reason tool_calls without tool call fragments".into())
                })?;
                let arguments: Value = if pending.arguments_json.is_empty() {
                    Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&pending.arguments_json).map_err(|e| {
                        ModelError::Decode(format!("bad tool call arguments: {e}"))
                    })?
                };
                let id = if pending.id.is_empty() {
                    ToolCallId::new()
                } else {
                    ToolCallId::from_raw(pending.id)
                };
                self.terminated = true;
                events.push(ModelEvent::ToolCall(ToolCallRequest {
                    id,
                    name: pending.name,
                    arguments,
                }));
            }
            Some(_) => {
                self.terminated = true;
                events.push(ModelEvent::Finished);
            }
            None => {}
        }

        Ok(events)
    }
}

// --- Wire shapes (only the fields we read) ---

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Deserialize)]
struct ToolCallFragment {
    index: Option<u64>,
    id: Option<String>,
    function: Option<FunctionFragment>,
}

#[derive(Deserialize)]
struct FunctionFragment {
    name: Option<String>,
    arguments: Option<String>,
}
