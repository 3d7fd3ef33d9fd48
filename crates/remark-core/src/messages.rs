use serde::{Deserialize, Serialize};

/// Who authored a message in the conversation.
///
/// Inbound requests may only carry `user`, `assistant`, or `system`;
/// `tool` messages are appended by the engine when a tool result comes
/// back and never accepted from clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// One entry in the ordered conversation. Immutable after creation;
/// the engine only ever appends new messages, never rewrites old ones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Compact record of a tool call the assistant made, stored as the
/// content of an assistant message so the flat `{role, content}` shape
/// survives the loop. Providers re-expand it into their wire format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: serde_json::Value,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }

    /// Assistant message recording a tool call in the conversation.
    pub fn tool_call(tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        let record = ToolCallRecord {
            tool: tool.into(),
            arguments,
        };
        Self {
            role: Role::Assistant,
            content: serde_json::to_string(&record).unwrap_or_default(),
        }
    }

    /// Parse this message back into a tool-call record, if it is one.
    pub fn as_tool_call(&self) -> Option<ToolCallRecord> {
        if self.role != Role::Assistant {
            return None;
        }
        serde_json::from_str(&self.content).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), r#""tool""#);
    }

    #[test]
    fn unknown_role_rejected() {
        let err = serde_json::from_str::<Role>(r#""bogus""#);
        assert!(err.is_err());
    }

    #[test]
    fn message_serde_roundtrip() {
        let messages = vec![
            ChatMessage::user("show me comments from post 1"),
            ChatMessage::assistant("here they are"),
            ChatMessage::system("you answer questions about comments"),
            ChatMessage::tool_result(r#"[{"id":1}]"#),
        ];
        for msg in &messages {
            let json = serde_json::to_string(msg).unwrap();
            let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.role, msg.role);
            assert_eq!(parsed.content, msg.content);
        }
    }

    #[test]
    fn tool_call_record_roundtrip() {
        let msg = ChatMessage::tool_call("fetch_comments", serde_json::json!({"postId": 1}));
        assert_eq!(msg.role, Role::Assistant);

        let record = msg.as_tool_call().expect("should parse back");
        assert_eq!(record.tool, "fetch_comments");
        assert_eq!(record.arguments["postId"], 1);
    }

    #[test]
    fn plain_assistant_text_is_not_a_tool_call() {
        let msg = ChatMessage::assistant("just prose");
        assert!(msg.as_tool_call().is_none());
    }

    #[test]
    fn tool_result_is_not_a_tool_call() {
        let msg = ChatMessage::tool_result(r#"{"tool":"x","arguments":{}}"#);
        assert!(msg.as_tool_call().is_none());
    }
}
