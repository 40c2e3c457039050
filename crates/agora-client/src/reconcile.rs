//! Stream reconciliation: folds the events of one run into a single answer.
//!
//! Rules run per event, in order:
//!
//! 1. assistant token deltas append to a buffer and are surfaced immediately;
//! 2. value snapshots replace the authoritative answer with the text of their
//!    last assistant message, cleared when that text is empty (not surfaced,
//!    the caller renders the final answer);
//! 3. update snapshots are searched for messages (bounded by
//!    [`MAX_PAYLOAD_DEPTH`]); assistant texts are surfaced, and the last one
//!    becomes the answer unless a snapshot already set it;
//! 4. metadata from every decoded message is merged with [`prefer_marked`];
//! 5. a top-level result container (`result`, `output`, ...) is authoritative
//!    and surfaced.
//!
//! Within one event the same text is surfaced at most once.

use std::collections::HashSet;

use serde_json::Value;
use tracing::trace;

use agora_core::types::{ChatMessage, Metadata, Role};

use crate::event::{StreamEvent, StreamEventKind};
use crate::sink::StreamSink;

/// Deepest nesting searched for messages inside an update payload.
pub const MAX_PAYLOAD_DEPTH: usize = 16;

/// Metadata key set by the backend proxy agent; maps carrying it take precedence.
pub const METADATA_MARKER: &str = "irbot";

const CONTAINER_KEYS: [&str; 5] = ["result", "output", "final_output", "value", "response"];

/// Outcome of one logical send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationResult {
    /// Best-effort answer; empty when nothing was obtained.
    pub final_text: String,
    pub metadata: Option<Metadata>,
    /// Whether any content was already surfaced while streaming.
    pub any_partial_content_emitted: bool,
    /// Set when the session had to be replaced to complete the send.
    pub updated_session_id: Option<String>,
}

impl ReconciliationResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The backend payload under the marker key, if captured.
    pub fn marked_metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()?.get(METADATA_MARKER)
    }
}

fn has_marker(metadata: &Metadata) -> bool {
    metadata.contains_key(METADATA_MARKER)
}

/// Choose between the current and a newly seen metadata map.
///
/// A map with the marker replaces whatever is held, including an earlier
/// marked map. An unmarked map never replaces a marked one; between unmarked
/// maps the newest wins. Empty maps carry nothing and are ignored.
pub fn prefer_marked(current: Option<Metadata>, new: Metadata) -> Option<Metadata> {
    if new.is_empty() {
        return current;
    }
    match current {
        Some(current) if has_marker(&current) && !has_marker(&new) => Some(current),
        _ => Some(new),
    }
}

fn has_role_tag(value: &Value) -> bool {
    value.get("type").is_some() || value.get("role").is_some()
}

/// Text of a message-like value: a bare string, a decodable message, or an
/// untyped `{"content": "..."}` object. Tagged objects that do not decode
/// (tool output, function results) carry no text.
fn text_of(value: &Value) -> Option<(String, Option<ChatMessage>)> {
    match value {
        Value::String(text) => Some((text.clone(), None)),
        other => match ChatMessage::from_wire(other) {
            Some(message) => Some((message.text(), Some(message))),
            None if has_role_tag(other) => None,
            None => other
                .get("content")
                .and_then(Value::as_str)
                .map(|text| (text.to_string(), None)),
        },
    }
}

/// Locate the fragment carried by a token event.
///
/// Accepted shapes: `{"chunk": m}`, `{"delta": m}`, `{"data": {"chunk": m}}`,
/// `{"content": "..."}`, `[m, run_metadata]`, or a bare message.
fn token_fragment(payload: &Value) -> Option<(String, Option<ChatMessage>)> {
    let carrier = payload
        .get("chunk")
        .or_else(|| payload.get("delta"))
        .or_else(|| payload.get("data").and_then(|data| data.get("chunk")));
    if let Some(carrier) = carrier {
        return text_of(carrier);
    }

    if let Value::Array(items) = payload {
        if let [first @ Value::Object(_), _] = items.as_slice() {
            return text_of(first);
        }
    }

    text_of(payload)
}

/// Bounded descent collecting every message found in `value`.
fn collect_messages(value: &Value, depth: usize, out: &mut Vec<ChatMessage>) {
    if depth > MAX_PAYLOAD_DEPTH {
        return;
    }
    if let Some(message) = ChatMessage::from_wire(value) {
        out.push(message);
        return;
    }
    match value {
        Value::Object(map) => {
            for child in map.values() {
                collect_messages(child, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_messages(child, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Accumulates the state of one run attempt.
#[derive(Debug, Default)]
pub struct Reconciler {
    tokens: Vec<String>,
    authoritative: Option<String>,
    snapshot_seen: bool,
    metadata: Option<Metadata>,
    any_partial: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every rule that matches `event`.
    pub fn apply(&mut self, event: &StreamEvent, sink: &mut dyn StreamSink) {
        let mut seen = HashSet::new();

        match event.kind {
            StreamEventKind::TokenDelta => self.apply_token(&event.payload, &mut seen, sink),
            StreamEventKind::ValuesSnapshot => self.apply_snapshot(&event.payload, sink),
            StreamEventKind::UpdateSnapshot => self.apply_update(&event.payload, &mut seen, sink),
            StreamEventKind::Custom => {
                for message in ChatMessage::list_from_wire(&event.payload) {
                    self.observe_metadata(&message, sink);
                }
            }
        }

        self.apply_container(&event.payload, &mut seen, sink);
    }

    fn apply_token(&mut self, payload: &Value, seen: &mut HashSet<String>, sink: &mut dyn StreamSink) {
        let Some((fragment, message)) = token_fragment(payload) else {
            trace!("token event without a fragment");
            return;
        };
        if let Some(ref message) = message {
            if message.role != Role::Assistant {
                return;
            }
            self.observe_metadata(message, sink);
        }
        if fragment.is_empty() {
            return;
        }
        if seen.insert(fragment.clone()) {
            sink.on_token(&fragment);
            self.any_partial = true;
        }
        self.tokens.push(fragment);
    }

    fn apply_snapshot(&mut self, payload: &Value, sink: &mut dyn StreamSink) {
        if let Value::String(text) = payload {
            if !text.is_empty() {
                self.authoritative = Some(text.clone());
                self.snapshot_seen = true;
            }
            return;
        }

        let messages = ChatMessage::list_from_wire(payload);
        for message in &messages {
            self.observe_metadata(message, sink);
        }

        // Only the newest assistant message counts; an empty one means this
        // turn produced no text, never that an older answer applies.
        let Some(last) = messages.iter().rev().find(|m| m.is_assistant()) else {
            return;
        };
        let text = last.text();
        self.authoritative = (!text.is_empty()).then_some(text);
        self.snapshot_seen = true;
    }

    fn apply_update(&mut self, payload: &Value, seen: &mut HashSet<String>, sink: &mut dyn StreamSink) {
        let mut found = Vec::new();
        collect_messages(payload, 0, &mut found);

        let mut last = None;
        for message in &found {
            self.observe_metadata(message, sink);
            if !message.is_assistant() {
                continue;
            }
            let text = message.text();
            if text.is_empty() {
                continue;
            }
            self.surface_message(&text, seen, sink);
            last = Some(text);
        }

        if !self.snapshot_seen {
            if let Some(text) = last {
                self.authoritative = Some(text);
            }
        }
    }

    fn apply_container(&mut self, payload: &Value, seen: &mut HashSet<String>, sink: &mut dyn StreamSink) {
        let Value::Object(map) = payload else {
            return;
        };
        for key in CONTAINER_KEYS {
            let Some(value) = map.get(key).filter(|v| !v.is_null()) else {
                continue;
            };
            let Some((text, message)) = text_of(value) else {
                continue;
            };
            if let Some(ref message) = message {
                self.observe_metadata(message, sink);
            }
            if text.is_empty() {
                continue;
            }
            self.surface_message(&text, seen, sink);
            self.authoritative = Some(text);
        }
    }

    fn surface_message(&mut self, text: &str, seen: &mut HashSet<String>, sink: &mut dyn StreamSink) {
        if seen.insert(text.to_string()) {
            sink.on_message(text);
            self.any_partial = true;
        }
    }

    fn observe_metadata(&mut self, message: &ChatMessage, sink: &mut dyn StreamSink) {
        let Some(ref new) = message.metadata else {
            return;
        };
        let captured = has_marker(new) && self.metadata.as_ref() != Some(new);
        self.metadata = prefer_marked(self.metadata.take(), new.clone());
        if captured {
            sink.on_metadata(new);
        }
    }

    /// Final answer: authoritative text, else the token buffer in arrival order, else empty.
    pub fn finish(self) -> ReconciliationResult {
        let final_text = match self.authoritative {
            Some(text) => text,
            None => self.tokens.concat(),
        };
        ReconciliationResult {
            final_text,
            metadata: self.metadata,
            any_partial_content_emitted: self.any_partial,
            updated_session_id: None,
        }
    }
}
