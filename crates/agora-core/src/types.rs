//! Chat message model and its wire encoding.
//!
//! Run services exchange messages in several JSON shapes. Everything that
//! enters the process is decoded once, here, into a [`ChatMessage`]; the
//! rest of the codebase never probes raw payloads for `content`/`type`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Free-form structured metadata attached to a message (`response_metadata` on the wire).
pub type Metadata = Map<String, Value>;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// The `type` tag used for this role on the wire.
    pub fn wire_type(self) -> &'static str {
        match self {
            Role::User => "human",
            Role::Assistant => "ai",
            Role::System => "system",
        }
    }

    /// Parse a `type` tag or a `role` name. Unknown tags (tool, function, ...) yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "human" | "user" | "HumanMessage" | "HumanMessageChunk" => Some(Role::User),
            "ai" | "assistant" | "AIMessage" | "AIMessageChunk" => Some(Role::Assistant),
            "system" | "SystemMessage" | "SystemMessageChunk" => Some(Role::System),
            _ => None,
        }
    }
}

/// One element of a multi-part message body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text(String),
    /// A structured block such as `{"type": "text", "text": "..."}`.
    Block(Value),
}

impl ContentPart {
    fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Block(block) => block
                .get("text")
                .and_then(Value::as_str)
                .or_else(|| block.get("content").and_then(Value::as_str)),
        }
    }
}

/// Message body: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(MessageContent::Text(text.clone())),
            Value::Null => Some(MessageContent::Text(String::new())),
            Value::Array(items) => Some(MessageContent::Parts(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => ContentPart::Text(text.clone()),
                        other => ContentPart::Block(other.clone()),
                    })
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Flatten to text. Textual parts are joined with newlines; non-textual parts are skipped.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A role-tagged utterance. Never mutated after construction; turns only append.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    pub metadata: Option<Metadata>,
    /// Session id carried alongside the message when the run config cannot be read.
    pub session_hint: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            metadata: None,
            session_hint: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_session_hint(mut self, session_id: impl Into<String>) -> Self {
        self.session_hint = Some(session_id.into());
        self
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Decode a message from any accepted wire shape:
    ///
    /// - `{"type": "ai", "content": ...}` (typed object)
    /// - `{"role": "assistant", "content": ...}` (role object)
    /// - `["user", "text"]` (tuple)
    ///
    /// Returns `None` for anything else, including messages with an unknown role.
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Self::from_object(map),
            Value::Array(items) => Self::from_tuple(items),
            _ => None,
        }
    }

    fn from_object(map: &Map<String, Value>) -> Option<Self> {
        let role = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(Role::from_tag)
            .or_else(|| map.get("role").and_then(Value::as_str).and_then(Role::from_tag))?;
        let content = MessageContent::from_wire(map.get("content")?)?;

        let metadata = map
            .get("response_metadata")
            .or_else(|| map.get("metadata"))
            .and_then(Value::as_object)
            .cloned();

        let session_hint = map
            .get("additional_kwargs")
            .and_then(|kwargs| kwargs.get("session_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            role,
            content,
            metadata,
            session_hint,
        })
    }

    fn from_tuple(items: &[Value]) -> Option<Self> {
        let [role, content] = items else {
            return None;
        };
        let role = role.as_str().and_then(Role::from_tag)?;
        let content = MessageContent::from_wire(content)?;
        Some(Self {
            role,
            content,
            metadata: None,
            session_hint: None,
        })
    }

    /// Decode a run input: a message list, a `{"messages": ...}` mapping, or a single message.
    pub fn list_from_wire(value: &Value) -> Vec<Self> {
        if let Some(inner) = value.get("messages") {
            return Self::list_from_wire(inner);
        }
        match value {
            Value::Array(items) => match Self::from_tuple(items) {
                Some(single) => vec![single],
                None => items.iter().filter_map(Self::from_wire).collect(),
            },
            other => Self::from_wire(other).into_iter().collect(),
        }
    }

    /// Encode in the typed-object shape.
    pub fn to_wire(&self) -> Value {
        let mut kwargs = Map::new();
        if let Some(ref session_id) = self.session_hint {
            kwargs.insert("session_id".into(), json!(session_id));
        }
        json!({
            "type": self.role.wire_type(),
            "content": self.content,
            "additional_kwargs": kwargs,
            "response_metadata": self.metadata.clone().unwrap_or_default(),
        })
    }
}

/// Ordered conversation transcript. Append-only within a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<ChatMessage>> for ConversationHistory {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_typed_object() {
        let value = json!({
            "type": "ai",
            "content": "Hi! How can I help?",
            "response_metadata": {"irbot": {"caption": "x"}},
        });
        let msg = ChatMessage::from_wire(&value).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text(), "Hi! How can I help?");
        assert!(msg.metadata.unwrap().contains_key("irbot"));
    }

    #[test]
    fn test_decode_role_object_with_parts() {
        let value = json!({
            "role": "assistant",
            "content": ["first", {"type": "text", "text": "second"}, {"content": "third"}, {"type": "image"}],
        });
        let msg = ChatMessage::from_wire(&value).unwrap();
        assert_eq!(msg.text(), "first\nsecond\nthird");
    }

    #[test]
    fn test_decode_tuple() {
        let msg = ChatMessage::from_wire(&json!(["user", "What's up?"])).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "What's up?");
    }

    #[test]
    fn test_decode_rejects_unknown_shapes() {
        assert!(ChatMessage::from_wire(&json!({"type": "tool", "content": "x"})).is_none());
        assert!(ChatMessage::from_wire(&json!({"content": "no role"})).is_none());
        assert!(ChatMessage::from_wire(&json!({"type": "ai"})).is_none());
        assert!(ChatMessage::from_wire(&json!("bare string")).is_none());
        assert!(ChatMessage::from_wire(&json!(42)).is_none());
    }

    #[test]
    fn test_session_hint_round_trip() {
        let msg = ChatMessage::user("hello").with_session_hint("thread-1");
        let wire = msg.to_wire();
        assert_eq!(wire["type"], "human");
        assert_eq!(wire["additional_kwargs"]["session_id"], "thread-1");
        let decoded = ChatMessage::from_wire(&wire).unwrap();
        assert_eq!(decoded.session_hint.as_deref(), Some("thread-1"));
    }

    #[test]
    fn test_list_from_wire_shapes() {
        let list = json!([{"type": "human", "content": "a"}, {"type": "ai", "content": "b"}]);
        assert_eq!(ChatMessage::list_from_wire(&list).len(), 2);

        let mapping = json!({"messages": ["user", "question"]});
        let decoded = ChatMessage::list_from_wire(&mapping);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].text(), "question");

        let single = json!({"role": "user", "content": "solo"});
        assert_eq!(ChatMessage::list_from_wire(&single).len(), 1);
    }
}
