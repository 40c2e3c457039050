//! Backend query proxy agent (`ace-dmo-irbot`).
//!
//! Forwards the latest user message to the backend under the run's session
//! id and reshapes the JSON answer into a chat reply. Tabular answers get a
//! short model-written explanation when a completer is available. Nothing is
//! accumulated between turns.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use agora_core::protocol::Configurable;
use agora_core::types::{ChatMessage, ConversationHistory, Metadata, Role};
use agora_providers::Completer;

use crate::backend::BackendClient;
use crate::prompt::EXPLAIN_TABLE_PROMPT;
use crate::{AgentEntrypoint, Final};

pub const BACKEND_PROXY_ID: &str = "ace-dmo-irbot";

/// Key under which the raw backend response is attached to the reply.
pub const BACKEND_METADATA_KEY: &str = "irbot";

const TEXT_KEYS: [&str; 5] = ["answer", "message", "text", "content", "response"];
const TYPE_KEYS: [&str; 3] = ["responseType", "type", "format"];
const TABLE_TYPE: &str = "table";

/// First non-blank string among the conventional answer fields, else the JSON itself.
pub fn extract_text(response: &Value) -> String {
    TEXT_KEYS
        .iter()
        .filter_map(|key| response.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| response.to_string())
}

fn has_grid(map: &Map<String, Value>) -> bool {
    map.contains_key("columns") && map.contains_key("values")
}

/// A response is tabular if a type field says `table`, or it carries both
/// `columns` and `values` (at the top level or under `data`).
pub fn is_tabular(response: &Value) -> bool {
    let Some(map) = response.as_object() else {
        return false;
    };
    let typed = TYPE_KEYS.iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .is_some_and(|kind| kind.eq_ignore_ascii_case(TABLE_TYPE))
    });
    typed
        || has_grid(map)
        || map
            .get("data")
            .and_then(Value::as_object)
            .is_some_and(has_grid)
}

/// Session id for the backend: run config first, then the message side channel.
fn resolve_session_id(configurable: &Configurable, message: &ChatMessage) -> String {
    configurable
        .thread_id
        .as_deref()
        .or(configurable.session_id.as_deref())
        .or(message.session_hint.as_deref())
        .filter(|id| !id.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

pub struct BackendProxyAgent {
    backend: Arc<dyn BackendClient>,
    completer: Option<Arc<dyn Completer>>,
}

impl BackendProxyAgent {
    pub fn new(backend: Arc<dyn BackendClient>, completer: Option<Arc<dyn Completer>>) -> Self {
        Self { backend, completer }
    }

    /// Model-written summary of a tabular response; `None` if unavailable or empty.
    async fn explain(
        &self,
        previous: Option<&ConversationHistory>,
        user: &ChatMessage,
        response: &Value,
    ) -> Option<String> {
        let completer = self.completer.as_ref()?;

        let mut transcript: Vec<ChatMessage> = previous
            .map(|history| history.messages().to_vec())
            .unwrap_or_default();
        transcript.push(user.clone());
        transcript.push(ChatMessage::user(format!(
            "Backend JSON response:\n{}",
            serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string())
        )));

        match completer.complete(&transcript, EXPLAIN_TABLE_PROMPT).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                debug!("Explanation came back empty");
                None
            }
            Err(e) => {
                warn!(%e, "Explanation failed, using plain text");
                None
            }
        }
    }
}

#[async_trait]
impl AgentEntrypoint for BackendProxyAgent {
    fn id(&self) -> &str {
        BACKEND_PROXY_ID
    }

    fn description(&self) -> &str {
        "Proxies questions to the query backend and explains tabular answers"
    }

    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        previous: Option<ConversationHistory>,
        configurable: &Configurable,
    ) -> Final {
        let Some(user) = messages.iter().rev().find(|m| m.role == Role::User) else {
            return Final {
                value: ChatMessage::assistant(""),
                save: Some(previous.unwrap_or_default()),
            };
        };

        let session_id = resolve_session_id(configurable, user);
        info!(%session_id, "Forwarding query to backend");

        let response = match self.backend.query(&user.text(), &session_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%e, %session_id, "Backend query failed");
                return Final {
                    value: ChatMessage::assistant(format!("Backend error: {e}")),
                    save: None,
                };
            }
        };

        let text = if is_tabular(&response) {
            match self.explain(previous.as_ref(), user, &response).await {
                Some(explanation) => explanation,
                None => extract_text(&response),
            }
        } else {
            extract_text(&response)
        };

        let mut metadata = Metadata::new();
        metadata.insert(BACKEND_METADATA_KEY.to_string(), response);

        Final {
            value: ChatMessage::assistant(text).with_metadata(metadata),
            save: None,
        }
    }
}
