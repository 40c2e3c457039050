//! OpenAI Chat Completions backend.
//!
//! Streams `/v1/chat/completions` and concatenates the text deltas. Works
//! against any OpenAI-compatible endpoint via `base_url`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use agora_core::types::{ChatMessage, Role};

use crate::Completer;
use crate::sse::{SseEvent, parse_sse_stream};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiCompleter {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompleter {
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            max_tokens: 4096,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Stream the reply as text deltas.
    pub async fn stream(
        &self,
        messages: &[ChatMessage],
        system_prompt: &str,
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>> {
        let Some(ref api_key) = self.api_key else {
            anyhow::bail!("no API key configured for model '{}'", self.model);
        };

        let body = OpenAiRequest {
            model: self.model.clone(),
            messages: format_messages(messages, system_prompt),
            max_tokens: self.max_tokens,
            stream: true,
        };

        debug!(model = %body.model, base_url = %self.base_url, messages = body.messages.len(), "Streaming OpenAI-compatible API");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {body}");
        }

        Ok(Box::pin(text_deltas(parse_sse_stream(response))))
    }
}

/// Map chat-completion SSE events to their non-empty text deltas, stopping at `[DONE]`.
fn text_deltas(
    sse: impl Stream<Item = anyhow::Result<SseEvent>> + Send + 'static,
) -> impl Stream<Item = anyhow::Result<String>> + Send {
    futures::stream::unfold(Box::pin(sse), |mut sse| async move {
        loop {
            match sse.next().await {
                Some(Ok(event)) => {
                    let data = event.data.trim();
                    // OpenAI terminates with "data: [DONE]"
                    if data == "[DONE]" {
                        return None;
                    }

                    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
                        Ok(c) => c,
                        Err(e) => {
                            trace!(%e, data, "Failed to parse OpenAI chunk");
                            continue;
                        }
                    };

                    let content = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                        .filter(|c| !c.is_empty());
                    if let Some(content) = content {
                        return Some((Ok(content), sse));
                    }
                }
                Some(Err(e)) => return Some((Err(e), sse)),
                None => return None,
            }
        }
    })
}

fn format_messages(messages: &[ChatMessage], system_prompt: &str) -> Vec<serde_json::Value> {
    let mut formatted = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        formatted.push(json!({ "role": "system", "content": system_prompt }));
    }
    for message in messages {
        let text = message.text();
        if text.is_empty() {
            continue;
        }
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        formatted.push(json!({ "role": role, "content": text }));
    }
    formatted
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatMessage], system_prompt: &str) -> anyhow::Result<String> {
        let mut stream = self.stream(messages, system_prompt).await?;
        let mut reply = String::new();
        while let Some(delta) = stream.next().await {
            reply.push_str(&delta?);
        }
        debug!(model = %self.model, chars = reply.len(), "Completion finished");
        Ok(reply)
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::sse::parse_sse_bytes;

    #[test]
    fn test_custom_base_url() {
        let completer = OpenAiCompleter::new("gpt-4o", None, Some("https://my-proxy.example.com/"));
        assert_eq!(completer.base_url, "https://my-proxy.example.com");
        assert_eq!(completer.id(), "openai");
    }

    #[test]
    fn test_format_messages_with_system() {
        let messages = vec![
            ChatMessage::user("Who are you?"),
            ChatMessage::assistant(""),
            ChatMessage::assistant("A philosopher."),
        ];
        let formatted = format_messages(&messages, "You are Plato.");
        assert_eq!(formatted.len(), 3);
        assert_eq!(formatted[0]["role"], "system");
        assert_eq!(formatted[1]["role"], "user");
        assert_eq!(formatted[2]["content"], "A philosopher.");
    }

    #[test]
    fn test_chunk_deserialization_text() {
        let json = r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_text_deltas_stop_at_done() {
        let body: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            )),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"Know \"}}]}\n\n")),
            Ok(Bytes::from_static(b"data: not json\n\n")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"thyself\"}}]}\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n")),
        ];
        let deltas = text_deltas(parse_sse_bytes(futures::stream::iter(body)));
        futures::pin_mut!(deltas);
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            text.push_str(&delta.unwrap());
        }
        assert_eq!(text, "Know thyself");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let completer = OpenAiCompleter::new("gpt-4o", None, Some("http://127.0.0.1:9"));
        let err = completer
            .complete(&[ChatMessage::user("hi")], "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no API key"));
    }
}
