use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use remark_core::ids::RequestId;
use remark_core::messages::ChatMessage;
use remark_core::protocol::StreamEvent;
use remark_engine::{ChatRunner, EngineError, LoopEvent};
use remark_schema::{Field, Schema};

use crate::emitter::{EmitterError, StreamEmitter};
use crate::server::AppState;

/// Shape of the request body: `{ "messages": [{role, content}, ...] }`.
/// Clients may only send `user`/`assistant`/`system` roles; `tool`
/// messages belong to the engine.
pub fn request_schema() -> Schema {
    Schema::object(vec![Field::required(
        "messages",
        Schema::array(Schema::object(vec![
            Field::required(
                "role",
                Schema::StringEnum(vec!["user", "assistant", "system"]),
            ),
            Field::required("content", Schema::String),
        ])),
    )])
}

/// POST /api/comments/chat. Validation failures return a JSON 400
/// before any stream bytes are written; once the response starts, every
/// failure becomes a terminal `error` event on the stream instead.
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(json) => json,
        Err(rejection) => return bad_request(format!("invalid JSON body: {rejection}")),
    };

    if let Err(err) = request_schema().validate(&body) {
        return bad_request(err.to_string());
    }

    let inbound = match decode_messages(&body) {
        Ok(messages) => messages,
        Err(err) => {
            error!(error = %err, "validated body failed to decode");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal message decoding failure" })),
            )
                .into_response();
        }
    };

    let request_id = RequestId::new();
    info!(request_id = %request_id, messages = inbound.len(), "chat request accepted");

    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(state.stream_buffer);
    tokio::spawn(run_session(state, request_id, inbound, event_tx));

    sse_response(event_rx)
}

/// One request's session: drives the tool-calling loop and bridges its
/// progress events onto the response stream. The response body holds
/// the receiving half of `event_tx`; when the client disconnects the
/// body is dropped, the emitter reports `Disconnected`, and the loop is
/// cancelled without emitting a terminal event.
#[instrument(skip_all, fields(request_id = %request_id))]
async fn run_session(
    state: AppState,
    request_id: RequestId,
    inbound: Vec<ChatMessage>,
    event_tx: mpsc::Sender<StreamEvent>,
) {
    let mut emitter = StreamEmitter::new(event_tx);
    if let Err(err) = emitter.open().await {
        debug!(error = %err, "client gone before the stream opened");
        return;
    }

    let cancel = CancellationToken::new();
    let (loop_tx, mut loop_rx) = mpsc::channel::<LoopEvent>(64);

    let runner =
        ChatRunner::new(Arc::clone(&state.agent)).with_config(state.runner_config.clone());
    let runner_cancel = cancel.clone();
    let handle = tokio::spawn(async move { runner.run(inbound, loop_tx, runner_cancel).await });

    while let Some(event) = loop_rx.recv().await {
        let forwarded = match event {
            LoopEvent::TextDelta { delta } => emitter.chunk(delta).await,
            LoopEvent::ToolStart { id, name } => {
                debug!(call_id = %id, tool = %name, "tool call started");
                Ok(())
            }
            LoopEvent::ToolEnd { id, duration_ms } => {
                debug!(call_id = %id, duration_ms, "tool call finished");
                Ok(())
            }
        };
        if forwarded == Err(EmitterError::Disconnected) {
            cancel.cancel();
            break;
        }
    }

    // Closing the receiver lets a still-pending loop send fail instead
    // of blocking forever against a full channel.
    drop(loop_rx);

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(join_err) => Err(EngineError::Internal(format!(
            "chat loop task failed: {join_err}"
        ))),
    };

    match outcome {
        Ok(()) => {
            if let Err(err) = emitter.complete().await {
                debug!(error = %err, "stream closed before completion event");
            } else {
                info!("chat request completed");
            }
        }
        Err(EngineError::Aborted) => {
            // Client already gone; nobody is listening for a terminal
            // event.
            info!("chat request aborted by client disconnect");
        }
        Err(err) => {
            error!(error = %err, "chat request failed");
            if let Err(send_err) = emitter.fail(err.to_string()).await {
                debug!(error = %send_err, "stream closed before error event");
            }
        }
    }
}

/// Decode the schema-validated body into typed messages. A failure
/// here means the request schema and `ChatMessage` drifted apart; it
/// must surface loudly rather than run the loop on a defaulted
/// conversation.
fn decode_messages(body: &Value) -> Result<Vec<ChatMessage>, String> {
    let messages = body
        .get("messages")
        .ok_or_else(|| "messages missing after validation".to_string())?;
    serde_json::from_value(messages.clone()).map_err(|e| e.to_string())
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn sse_response(event_rx: mpsc::Receiver<StreamEvent>) -> Response {
    let frames = ReceiverStream::new(event_rx)
        .map(|event| Ok::<Bytes, std::convert::Infallible>(Bytes::from(event.to_sse_frame())));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
