//! Philosopher persona agent (`ace-base-agent`).
//!
//! Accumulates the whole conversation and answers in character.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use agora_core::protocol::Configurable;
use agora_core::types::{ChatMessage, ConversationHistory};
use agora_providers::Completer;

use crate::prompt::{DEFAULT_PERSONA, philosopher_prompt};
use crate::{AgentEntrypoint, Final};

pub const PHILOSOPHER_ID: &str = "ace-base-agent";

pub struct PhilosopherAgent {
    completer: Arc<dyn Completer>,
}

impl PhilosopherAgent {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }
}

#[async_trait]
impl AgentEntrypoint for PhilosopherAgent {
    fn id(&self) -> &str {
        PHILOSOPHER_ID
    }

    fn description(&self) -> &str {
        "Plato, the philosopher persona"
    }

    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        previous: Option<ConversationHistory>,
        configurable: &Configurable,
    ) -> Final {
        let assistant_name = configurable
            .assistant_name
            .as_deref()
            .unwrap_or(DEFAULT_PERSONA);
        let user_id = configurable.user_id.as_deref().unwrap_or("unknown");

        let mut history = previous.clone().unwrap_or_default();
        info!(
            assistant_name,
            user_id,
            incoming = messages.len(),
            previous = history.len(),
            "Philosopher turn started"
        );
        history.extend(messages);

        let prompt = philosopher_prompt(assistant_name);
        match self.completer.complete(history.messages(), &prompt).await {
            Ok(text) => {
                debug!(chars = text.len(), "Model reply received");
                let reply = ChatMessage::assistant(text);
                history.push(reply.clone());
                Final {
                    value: reply,
                    save: Some(history),
                }
            }
            Err(e) => {
                warn!(%e, completer = self.completer.id(), "Model call failed");
                Final {
                    value: ChatMessage::assistant(format!("Model error: {e}")),
                    save: previous,
                }
            }
        }
    }
}
