//! Generic SSE (Server-Sent Events) line parser.
//!
//! Converts a `reqwest::Response` body (or any byte stream) into a
//! `Stream<Item = SseEvent>`.

use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio_stream::StreamExt;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Event name; SSE treats a missing name as `message`.
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Parse a reqwest response body as an SSE stream.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send {
    parse_sse_bytes(response.bytes_stream())
}

/// Parse any chunked byte stream as SSE.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across chunks decode correctly.
pub fn parse_sse_bytes<S, E>(byte_stream: S) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + 'static,
{
    let byte_stream = byte_stream.map(|chunk| chunk.map_err(|e| e.to_string()));

    futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            current_event: None,
            current_data: Vec::new(),
            current_id: None,
        },
        |mut state| async move {
            loop {
                if let Some(newline_pos) = state.buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = state.buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&raw[..newline_pos]);
                    let line = line.trim_end_matches('\r');

                    if line.is_empty() {
                        // Empty line = dispatch event
                        if let Some(event) = state.take_event() {
                            return Some((Ok(event), state));
                        }
                        continue;
                    }

                    state.apply_line(line);
                    continue;
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        return Some((Err(anyhow::anyhow!("SSE stream error: {e}")), state));
                    }
                    None => {
                        // Stream ended. A trailing line without a newline still counts.
                        if !state.buffer.is_empty() {
                            let raw = std::mem::take(&mut state.buffer);
                            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
                            if !line.is_empty() {
                                state.apply_line(&line);
                            }
                        }
                        return state.take_event().map(|event| (Ok(event), state));
                    }
                }
            }
        },
    )
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

struct SseState {
    byte_stream: ByteStream,
    buffer: Vec<u8>,
    current_event: Option<String>,
    current_data: Vec<String>,
    current_id: Option<String>,
}

impl SseState {
    fn apply_line(&mut self, line: &str) {
        if line.starts_with(':') {
            // Comment / keep-alive
            return;
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.current_event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.current_data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            self.current_id = Some(value.trim_start().to_string());
        }
        // Ignore unknown fields
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.current_event = None;
            return None;
        }
        let event = SseEvent {
            event: self.current_event.take(),
            data: self.current_data.join("\n"),
            id: self.current_id.take(),
        };
        self.current_data.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
        let owned: Vec<Result<Bytes, std::io::Error>> =
            parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect();
        futures::stream::iter(owned)
    }

    async fn collect(parts: &[&[u8]]) -> Vec<SseEvent> {
        let stream = parse_sse_bytes(chunks(parts));
        futures::pin_mut!(stream);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_parses_named_events() {
        let events = collect(&[
            b"event: metadata\ndata: {\"run_id\":\"r1\"}\n\n",
            b"event: values\ndata: {\"messages\":[]}\n\n",
        ])
        .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "metadata");
        assert_eq!(events[1].data, r#"{"messages":[]}"#);
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let events = collect(&[b"event: val", b"ues\r\ndata: {\"a\"", b":1}\r\n", b"\r\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "values");
        assert_eq!(events[0].data, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        let text = "data: héllo\n\n".as_bytes();
        // Split inside the two-byte 'é'
        let events = collect(&[&text[..8], &text[8..]]).await;
        assert_eq!(events[0].data, "héllo");
    }

    #[tokio::test]
    async fn test_comments_and_multiline_data() {
        let events = collect(&[b": keep-alive\n\ndata: one\ndata: two\nid: 7\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].name(), "message");
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let events = collect(&[b"event: end\ndata: null"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "end");
        assert_eq!(events[0].data, "null");
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: partial\n")),
            Err(std::io::Error::other("connection reset")),
        ];
        let stream = parse_sse_bytes(futures::stream::iter(parts));
        futures::pin_mut!(stream);
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
