//! Streaming run protocol shared by the client and the dev host.
//!
//! Runs are started with `POST /threads/{id}/runs/stream` (or `/runs/stream`
//! for threadless runs) and answered with a Server-Sent Events body whose
//! event names are listed below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EVENT_METADATA: &str = "metadata";
pub const EVENT_VALUES: &str = "values";
pub const EVENT_UPDATES: &str = "updates";
pub const EVENT_MESSAGES: &str = "messages";
pub const EVENT_EVENTS: &str = "events";
pub const EVENT_END: &str = "end";
pub const EVENT_ERROR: &str = "error";

/// Chat-model token event name used inside `events` payloads.
pub const CHAT_MODEL_STREAM: &str = "on_chat_model_stream";

/// How much of a run the server streams back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamMode {
    /// Per-token message deltas.
    #[serde(rename = "messages-tuple", alias = "messages")]
    Tokens,
    /// Full value snapshot after each step.
    #[default]
    #[serde(rename = "values")]
    Snapshots,
    /// Per-node state updates.
    #[serde(rename = "updates")]
    FullUpdates,
    /// Raw runtime events.
    #[serde(rename = "events")]
    RawEvents,
}

impl StreamMode {
    /// Name sent in the `stream_mode` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            StreamMode::Tokens => "messages-tuple",
            StreamMode::Snapshots => "values",
            StreamMode::FullUpdates => "updates",
            StreamMode::RawEvents => "events",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "messages" | "messages-tuple" | "tokens" => Ok(StreamMode::Tokens),
            "values" | "snapshots" => Ok(StreamMode::Snapshots),
            "updates" | "full-updates" => Ok(StreamMode::FullUpdates),
            "events" | "raw-events" => Ok(StreamMode::RawEvents),
            other => Err(format!("unknown stream mode '{other}'")),
        }
    }
}

/// The `configurable` block agents read their per-run settings from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configurable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Same value as `thread_id`; proxy agents read whichever key they recognize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub configurable: Configurable,
}

impl RunConfig {
    /// Config for one run: always tags the user, and names the session under both keys when present.
    pub fn for_session(user_email: &str, session_id: Option<&str>) -> Self {
        Self {
            configurable: Configurable {
                user_email: Some(user_email.to_string()),
                thread_id: session_id.map(str::to_string),
                session_id: session_id.map(str::to_string),
                ..Default::default()
            },
        }
    }
}

/// Body of a `runs/stream` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequestBody {
    pub assistant_id: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub stream_mode: StreamMode,
    #[serde(default)]
    pub config: RunConfig,
}

/// Response of `POST /threads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadCreated {
    pub thread_id: String,
}

/// One entry of `POST /assistants/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantInfo {
    pub assistant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AssistantInfo {
    /// Name to address the assistant by: its display name, else its id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.assistant_id)
    }
}
