use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use remark_core::ids::ToolCallId;
use remark_core::messages::ChatMessage;
use remark_core::model::{
    LanguageModel, ModelError, ModelEvent, ModelEventStream, ToolCallRequest,
};
use remark_core::tools::ToolDescriptor;

/// One pre-programmed answer to a `stream()` call.
pub enum MockResponse {
    /// Yield these events in order.
    Events(Vec<Result<ModelEvent, ModelError>>),
    /// Fail the `stream()` call itself.
    Error(ModelError),
}

impl MockResponse {
    /// Text deltas followed by Finished.
    pub fn text(chunks: &[&str]) -> Self {
        let mut events: Vec<Result<ModelEvent, ModelError>> = chunks
            .iter()
            .map(|c| Ok(ModelEvent::TextDelta { delta: c.to_string() }))
            .collect();
        events.push(Ok(ModelEvent::Finished));
        Self::Events(events)
    }

    /// A single tool call request ending the stream.
    pub fn tool_call(name: &str, arguments: Value) -> Self {
        Self::Events(vec![Ok(ModelEvent::ToolCall(ToolCallRequest {
            id: ToolCallId::new(),
            name: name.to_string(),
            arguments,
        }))])
    }

    /// A stream that fails mid-flight.
    pub fn stream_error(error: ModelError) -> Self {
        Self::Events(vec![Err(error)])
    }
}

enum Script {
    Sequence(Mutex<VecDeque<MockResponse>>),
    /// Request the same tool on every call, forever. For exercising
    /// the loop bound.
    AlwaysToolCall { name: String, arguments: Value },
}

/// Deterministic model double: returns pre-programmed responses in
/// sequence and counts calls.
pub struct MockModel {
    script: Script,
    call_count: AtomicUsize,
}

impl MockModel {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Script::Sequence(Mutex::new(responses.into())),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn always_tool_call(name: &str, arguments: Value) -> Self {
        Self {
            script: Script::AlwaysToolCall {
                name: name.to_string(),
                arguments,
            },
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(
        &self,
        _conversation: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<ModelEventStream, ModelError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        match &self.script {
            Script::Sequence(responses) => {
                let response = responses
                    .lock()
                    .expect("mock script lock poisoned")
                    .pop_front();
                match response {
                    Some(MockResponse::Events(events)) => Ok(Box::pin(stream::iter(events))),
                    Some(MockResponse::Error(e)) => Err(e),
                    None => Err(ModelError::Decode(format!(
                        "mock: no response scripted for call {idx}"
                    ))),
                }
            }
            Script::AlwaysToolCall { name, arguments } => {
                Ok(Box::pin(stream::iter(vec![Ok(ModelEvent::ToolCall(
                    ToolCallRequest {
                        id: ToolCallId::new(),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    },
                ))])))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn text_response() {
        let mock = MockModel::new(vec![MockResponse::text(&["hello ", "world"])]);
        let mut stream = mock.stream(&[], &[]).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ModelEvent::TextDelta { delta } if delta == "hello "));
        assert!(matches!(events[2], ModelEvent::Finished));
    }

    #[tokio::test]
    async fn sequential_responses_and_call_count() {
        let mock = MockModel::new(vec![
            MockResponse::tool_call("fetch_comments", serde_json::json!({"postId": 1})),
            MockResponse::text(&["done"]),
        ]);

        let mut first = mock.stream(&[], &[]).await.unwrap();
        match first.next().await.unwrap().unwrap() {
            ModelEvent::ToolCall(req) => assert_eq!(req.name, "fetch_comments"),
            other => panic!("expected ToolCall, got {other:?}"),
        }

        let _ = mock.stream(&[], &[]).await.unwrap();
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let mock = MockModel::new(vec![MockResponse::text(&["only one"])]);
        let _ = mock.stream(&[], &[]).await.unwrap();
        assert!(mock.stream(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn call_level_error() {
        let mock = MockModel::new(vec![MockResponse::Error(ModelError::Api {
            status: 500,
            body: "down".into(),
        })]);
        match mock.stream(&[], &[]).await {
            Err(ModelError::Api { status, .. }) => assert_eq!(status, 500),
            Err(other) => panic!("expected Api error, got {other:?}"),
            Ok(_) => panic!("expected Api error, got a stream"),
        }
    }

    #[tokio::test]
    async fn always_tool_call_never_runs_dry() {
        let mock = MockModel::always_tool_call("fetch_comments", serde_json::json!({}));
        for _ in 0..10 {
            let mut stream = mock.stream(&[], &[]).await.unwrap();
            let event = stream.next().await.unwrap().unwrap();
            assert!(matches!(event, ModelEvent::ToolCall(_)));
        }
        assert_eq!(mock.call_count(), 10);
    }
}
