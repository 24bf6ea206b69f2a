//! Request assembly: system prompt, history, current-schema context.

use formcraft_core::conversation::{Message, Role};
use formcraft_core::schema::SchemaTarget;
use formcraft_core::store::SchemaStore;

use crate::client::ChatMessage;

pub const SYSTEM_PROMPT: &str = r#"You are an expert in questionnaire creation. Always answer with valid JSON only, no prose outside it.

Your answer must have this shape:
{
  "response": "<message shown to the user>",
  "modifications": {
    "title": "<new survey title, optional>",
    "schemaPatch": [<RFC 6902 JSON Patch operations on the JSON Schema, optional>],
    "uiSchemaPatch": [<RFC 6902 JSON Patch operations on the UI Schema, optional>]
  }
}

Rules:
- Omit "modifications" when nothing changes.
- Patch paths are JSON Pointers relative to the current document shown to you.
- Allowed ops: add, remove, replace, move, copy, test.
- The JSON Schema must stay an object with a "properties" mapping."#;

/// System message carrying the current documents.
pub fn context_message(store: &SchemaStore) -> ChatMessage {
    ChatMessage::system(format!(
        "Current Schema:\n{}\n\nCurrent UI Schema:\n{}",
        store.to_pretty_text(SchemaTarget::Schema),
        store.to_pretty_text(SchemaTarget::UiSchema),
    ))
}

/// Full request: system prompt, prior conversation, context, new message.
pub fn build_messages(history: &[Message], store: &SchemaStore, user_message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().map(|message| match message.role {
        Role::User => ChatMessage::user(message.content.clone()),
        Role::Assistant => ChatMessage::assistant(message.content.clone()),
    }));
    messages.push(context_message(store));
    messages.push(ChatMessage::user(user_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatRole;
    use formcraft_core::conversation::Conversation;
    use serde_json::json;

    #[test]
    fn message_order() {
        let store = SchemaStore::new("T", json!({"type": "object", "properties": {}}), json!({}));
        let mut history = Conversation::with_greeting();
        history.push(Message::user("add a name field"));

        let messages = build_messages(history.messages(), &store, "make it required");
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::Assistant, ChatRole::User, ChatRole::System, ChatRole::User]
        );
        assert!(messages[3].content.starts_with("Current Schema:\n{"));
        assert!(messages[3].content.contains("\n\nCurrent UI Schema:\n{}"));
        assert_eq!(messages[4].content, "make it required");
    }
}
