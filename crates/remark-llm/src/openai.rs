use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::instrument;

use remark_core::messages::{ChatMessage, Role};
use remark_core::model::{LanguageModel, ModelError, ModelEvent, ModelEventStream};
use remark_core::tools::ToolDescriptor;

use crate::sse::{ChunkParser, SseLineDecoder};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI Chat Completions streaming client.
pub struct OpenAiModel {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(api_key: SecretString, model: Option<&str>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(&self, conversation: &[ChatMessage], tools: &[ToolDescriptor]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": convert_messages(conversation),
            "stream": true,
        });
        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, conversation, tools), fields(model = %self.model))]
    async fn stream(
        &self,
        conversation: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelEventStream, ModelError> {
        let body = self.build_body(conversation, tools);
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut byte_stream = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseLineDecoder::new();
            let mut parser = ChunkParser::new();

            while let Some(next) = byte_stream.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(ModelError::Network(e.to_string()));
                        return;
                    }
                };
                for payload in decoder.feed(&bytes) {
                    match parser.parse(&payload) {
                        Ok(events) => {
                            for event in events {
                                let stop = matches!(event, ModelEvent::ToolCall(_));
                                yield Ok(event);
                                if stop {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
                if parser.terminated() {
                    return;
                }
            }
            // Connection closed without a finish_reason; treat the turn
            // as finished so the caller is never left hanging.
            if !parser.terminated() {
                yield Ok(ModelEvent::Finished);
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Map the flat conversation onto the wire format. Assistant tool-call
/// records are re-expanded into `tool_calls` entries and the following
/// tool message is linked back with a synthesized deterministic id.
fn convert_messages(conversation: &[ChatMessage]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(conversation.len());
    let mut last_call_id: Option<String> = None;

    for (idx, msg) in conversation.iter().enumerate() {
        match msg.role {
            Role::System | Role::User => {
                wire.push(json!({"role": msg.role.as_str(), "content": msg.content}));
            }
            Role::Assistant => {
                if let Some(record) = msg.as_tool_call() {
                    let call_id = format!("call_{idx}");
                    wire.push(json!({
                        "role": "assistant",
                        "content": Value::Null,
                        "tool_calls": [{
                            "id": call_id,
                            "type": "function",
                            "function": {
                                "name": record.tool,
                                "arguments": record.arguments.to_string(),
                            }
                        }]
                    }));
                    last_call_id = Some(call_id);
                } else {
                    wire.push(json!({"role": "assistant", "content": msg.content}));
                }
            }
            Role::Tool => {
                let call_id = last_call_id.take().unwrap_or_else(|| "call_0".to_string());
                wire.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": msg.content,
                }));
            }
        }
    }
    wire
}
