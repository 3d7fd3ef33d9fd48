use std::sync::Arc;

use remark_core::messages::ChatMessage;
use remark_core::model::LanguageModel;

use crate::registry::{RegistryError, ToolRegistry};
use crate::tools::FetchCommentsTool;

const COMMENTS_INSTRUCTIONS: &str = "\
You are a helpful assistant that answers user questions about comments.
Call the fetch_comments tool whenever comment data is needed to answer
accurately. Use the id, postId, email, and name filters to narrow the
query, and limit to keep results small. Base answers on the fetched
data, be concise, and say so plainly when no comments match.";

/// The process-wide agent definition: instructions, model reference,
/// and tool registry. Built once at startup and shared read-only by
/// every request; per-request state (conversation, stream) lives in
/// the request task and is never written back here.
pub struct AgentDefinition {
    pub name: &'static str,
    pub instructions: String,
    pub model: Arc<dyn LanguageModel>,
    pub registry: Arc<ToolRegistry>,
}

impl AgentDefinition {
    /// The comments agent: one registered tool over the comments API.
    pub fn comments(
        model: Arc<dyn LanguageModel>,
        comments_url: &str,
    ) -> Result<Self, RegistryError> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FetchCommentsTool::new(comments_url)))?;

        Ok(Self {
            name: "comments-agent",
            instructions: COMMENTS_INSTRUCTIONS.to_string(),
            model,
            registry: Arc::new(registry),
        })
    }

    /// Build the working conversation for one request: the system
    /// instructions followed by the validated inbound messages.
    pub fn seed_conversation(&self, inbound: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut conversation = Vec::with_capacity(inbound.len() + 1);
        conversation.push(ChatMessage::system(&self.instructions));
        conversation.extend(inbound);
        conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remark_core::messages::Role;
    use remark_llm::MockModel;

    fn agent() -> AgentDefinition {
        let model = Arc::new(MockModel::new(vec![]));
        AgentDefinition::comments(model, "http://localhost/comments").unwrap()
    }

    #[test]
    fn registers_the_comments_tool() {
        let agent = agent();
        assert!(agent.registry.contains("fetch_comments"));
        assert_eq!(agent.registry.count(), 1);
    }

    #[test]
    fn seed_prepends_instructions() {
        let agent = agent();
        let conversation =
            agent.seed_conversation(vec![ChatMessage::user("comments from post 1?")]);

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].role, Role::System);
        assert!(conversation[0].content.contains("fetch_comments"));
        assert_eq!(conversation[1].role, Role::User);
    }

    #[test]
    fn seed_preserves_inbound_order() {
        let agent = agent();
        let conversation = agent.seed_conversation(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ]);
        let contents: Vec<&str> = conversation[1..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "reply", "second"]);
    }
}
