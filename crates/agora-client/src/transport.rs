//! Run service transport.
//!
//! [`RunService`] is the seam between the reconciliation engine and the
//! network; [`HttpRunService`] speaks the streaming run protocol over HTTP.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tracing::debug;

use agora_core::protocol::{
    AssistantInfo, EVENT_END, EVENT_ERROR, RunConfig, RunRequestBody, StreamMode,
};
use agora_core::types::ChatMessage;
use agora_providers::sse::{SseEvent, parse_sse_stream};

use crate::error::RunError;
use crate::event::StreamEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, RunError>> + Send>>;

/// Whatever a session-creation call returned, in extraction preference order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CreatedSession {
    Thread { thread_id: String },
    Keyed { id: String },
    Bare(String),
}

impl CreatedSession {
    /// The session id, if non-blank.
    pub fn into_id(self) -> Option<String> {
        let id = match self {
            CreatedSession::Thread { thread_id } => thread_id,
            CreatedSession::Keyed { id } => id,
            CreatedSession::Bare(id) => id,
        };
        let id = id.trim().to_string();
        (!id.is_empty()).then_some(id)
    }
}

/// One streamed run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub session_id: Option<String>,
    pub assistant_id: String,
    pub message: ChatMessage,
    pub stream_mode: StreamMode,
    pub config: RunConfig,
}

impl RunRequest {
    fn body(&self) -> RunRequestBody {
        RunRequestBody {
            assistant_id: self.assistant_id.clone(),
            input: json!({ "messages": [self.message.to_wire()] }),
            stream_mode: self.stream_mode,
            config: self.config.clone(),
        }
    }
}

#[async_trait]
pub trait RunService: Send + Sync {
    /// Create a new session (thread) on the server.
    async fn create_session(&self) -> Result<CreatedSession, RunError>;

    /// Start a run and stream its events until the server closes the stream.
    async fn stream_run(&self, request: RunRequest) -> Result<EventStream, RunError>;

    /// Assistants the server can run.
    async fn list_assistants(&self) -> Result<Vec<AssistantInfo>, RunError>;
}

/// Run service reached over HTTP + SSE.
pub struct HttpRunService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRunService {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, RunError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RunError::Http { status, body });
        }
        Ok(response)
    }
}

/// Turn a raw SSE event into a stream event. `end` yields `None`; `error` fails the stream.
fn decode_sse(event: SseEvent) -> Result<Option<StreamEvent>, RunError> {
    let name = event.name();
    if name == EVENT_END {
        return Ok(None);
    }
    let payload = serde_json::from_str(&event.data).unwrap_or(Value::String(event.data.clone()));
    if name == EVENT_ERROR {
        let detail = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| event.data.clone());
        return Err(RunError::Remote(detail));
    }
    Ok(Some(StreamEvent::new(name, payload)))
}

#[async_trait]
impl RunService for HttpRunService {
    async fn create_session(&self) -> Result<CreatedSession, RunError> {
        let response = self.post("/threads", &json!({})).await?;
        Ok(response.json().await?)
    }

    async fn stream_run(&self, request: RunRequest) -> Result<EventStream, RunError> {
        let path = match request.session_id {
            Some(ref id) => format!("/threads/{id}/runs/stream"),
            None => "/runs/stream".to_string(),
        };
        debug!(%path, assistant = %request.assistant_id, mode = %request.stream_mode, "Starting streamed run");

        let body = serde_json::to_value(request.body()).map_err(|e| RunError::Decode(e.to_string()))?;
        let response = self.post(&path, &body).await?;

        let events = parse_sse_stream(response)
            .map(|item| match item {
                Ok(event) => decode_sse(event),
                Err(e) => Err(RunError::Transport(e.to_string())),
            })
            .take_while(|item| !matches!(item, Ok(None)))
            .filter_map(Result::transpose);

        Ok(Box::pin(events))
    }

    async fn list_assistants(&self) -> Result<Vec<AssistantInfo>, RunError> {
        let response = self.post("/assistants/search", &json!({ "limit": 100 })).await?;
        Ok(response.json().await?)
    }
}
