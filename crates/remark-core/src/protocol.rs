use serde::{Deserialize, Serialize};

/// Outbound event protocol for one chat request.
///
/// Ordering contract per request: `Connected`, then zero or more
/// `Chunk`, then exactly one of `Done`/`Error`, and nothing after the
/// terminal event. The emitter enforces this; this type defines the
/// wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Connected,
    Chunk { content: String },
    Done,
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Chunk { .. } => "chunk",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Encode as one server-sent-events frame. serde_json escaping
    /// guarantees embedded quotes and control characters cannot break
    /// the `data: <json>\n\n` framing.
    pub fn to_sse_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| {
            // Only possible if serialization of a plain enum fails,
            // which it cannot; keep the stream well-formed regardless.
            r#"{"type":"error","message":"event serialization failed"}"#.to_string()
        });
        format!("data: {json}\n\n")
    }
}
