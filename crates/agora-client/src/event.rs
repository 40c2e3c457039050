//! Stream events as received from a run.

use serde_json::Value;

use agora_core::protocol::{
    CHAT_MODEL_STREAM, EVENT_EVENTS, EVENT_MESSAGES, EVENT_UPDATES, EVENT_VALUES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    /// Partial completion: a text fragment to append.
    TokenDelta,
    /// Full state snapshot after a step.
    ValuesSnapshot,
    /// Per-node update; messages may be nested anywhere inside.
    UpdateSnapshot,
    Custom,
}

/// One unit received from a remote run, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    /// Raw SSE event name.
    pub name: String,
    pub payload: Value,
}

impl StreamEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        let name = name.into();
        let kind = classify(&name, &payload);
        Self {
            kind,
            name,
            payload,
        }
    }
}

fn is_mode(name: &str, mode: &str) -> bool {
    name == mode
        || name
            .strip_prefix(mode)
            .is_some_and(|rest| rest.starts_with('|'))
}

/// Classify an event by its name (and, for raw runtime events, its payload).
pub fn classify(name: &str, payload: &Value) -> StreamEventKind {
    if name == EVENT_VALUES {
        StreamEventKind::ValuesSnapshot
    } else if is_mode(name, EVENT_UPDATES) {
        StreamEventKind::UpdateSnapshot
    } else if is_mode(name, EVENT_MESSAGES) || name.contains(CHAT_MODEL_STREAM) {
        StreamEventKind::TokenDelta
    } else if is_mode(name, EVENT_EVENTS)
        && payload.get("event").and_then(Value::as_str) == Some(CHAT_MODEL_STREAM)
    {
        StreamEventKind::TokenDelta
    } else {
        StreamEventKind::Custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_by_name() {
        let empty = Value::Null;
        assert_eq!(classify("values", &empty), StreamEventKind::ValuesSnapshot);
        assert_eq!(classify("updates", &empty), StreamEventKind::UpdateSnapshot);
        assert_eq!(classify("updates|agent:1", &empty), StreamEventKind::UpdateSnapshot);
        assert_eq!(classify("messages", &empty), StreamEventKind::TokenDelta);
        assert_eq!(classify("messages|sub", &empty), StreamEventKind::TokenDelta);
        assert_eq!(classify("on_chat_model_stream", &empty), StreamEventKind::TokenDelta);
        assert_eq!(classify("metadata", &empty), StreamEventKind::Custom);
        assert_eq!(classify("updatesx", &empty), StreamEventKind::Custom);
        assert_eq!(classify("values|sub", &empty), StreamEventKind::Custom);
    }

    #[test]
    fn test_classify_raw_events_by_payload() {
        let token = json!({"event": "on_chat_model_stream", "data": {"chunk": {"content": "x"}}});
        let other = json!({"event": "on_chain_start"});
        assert_eq!(classify("events", &token), StreamEventKind::TokenDelta);
        assert_eq!(classify("events", &other), StreamEventKind::Custom);
    }
}
