//! Rendering an agent reply as the events of one streamed run.

use serde_json::{Value, json};

use agora_core::protocol::{
    CHAT_MODEL_STREAM, EVENT_END, EVENT_EVENTS, EVENT_MESSAGES, EVENT_METADATA, EVENT_UPDATES,
    EVENT_VALUES, StreamMode,
};
use agora_core::types::{ChatMessage, ConversationHistory};

/// Node name reported in update events.
pub const AGENT_NODE: &str = "agent";

/// One SSE event before it is framed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    pub name: &'static str,
    pub data: Value,
}

impl RunEvent {
    fn new(name: &'static str, data: Value) -> Self {
        Self { name, data }
    }

    pub fn metadata(run_id: &str, thread_id: Option<&str>) -> Self {
        Self::new(EVENT_METADATA, json!({ "run_id": run_id, "thread_id": thread_id }))
    }

    pub fn end() -> Self {
        Self::new(EVENT_END, Value::Null)
    }
}

/// Split text into word-sized pieces that concatenate back to the original.
pub fn chunk_text(text: &str) -> Vec<&str> {
    text.split_inclusive(' ').collect()
}

/// Token pieces of a reply; its metadata rides on the last piece.
fn reply_chunks(reply: &ChatMessage) -> Vec<Value> {
    let text = reply.text();
    let pieces = chunk_text(&text);
    let count = pieces.len();
    if count == 0 {
        return vec![reply.to_wire()];
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut chunk = ChatMessage::assistant(piece);
            if i + 1 == count {
                chunk.metadata = reply.metadata.clone();
            }
            chunk.to_wire()
        })
        .collect()
}

/// Events carrying `reply` in the requested mode, without the surrounding
/// `metadata`/`end` pair.
///
/// The values snapshot lists the saved history when the agent saved one,
/// otherwise the turn's input followed by the reply.
pub fn render(
    mode: StreamMode,
    input: &[ChatMessage],
    saved: Option<&ConversationHistory>,
    reply: &ChatMessage,
) -> Vec<RunEvent> {
    match mode {
        StreamMode::Snapshots => {
            let messages: Vec<Value> = match saved {
                Some(history) => history.messages().iter().map(ChatMessage::to_wire).collect(),
                None => input
                    .iter()
                    .chain(std::iter::once(reply))
                    .map(ChatMessage::to_wire)
                    .collect(),
            };
            vec![RunEvent::new(EVENT_VALUES, json!({ "messages": messages }))]
        }
        StreamMode::FullUpdates => vec![RunEvent::new(
            EVENT_UPDATES,
            json!({ AGENT_NODE: { "messages": [reply.to_wire()] } }),
        )],
        StreamMode::Tokens => reply_chunks(reply)
            .into_iter()
            .map(|chunk| RunEvent::new(EVENT_MESSAGES, json!([chunk, {}])))
            .collect(),
        StreamMode::RawEvents => reply_chunks(reply)
            .into_iter()
            .map(|chunk| {
                RunEvent::new(
                    EVENT_EVENTS,
                    json!({ "event": CHAT_MODEL_STREAM, "data": { "chunk": chunk } }),
                )
            })
            .collect(),
    }
}
