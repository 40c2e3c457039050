//! Agent entrypoints.
//!
//! An agent receives the new messages of a turn plus the history it saved
//! last turn, and returns a reply together with what to save next. Agents
//! recover from their own collaborator failures: a failed model or backend
//! call becomes a visible assistant message, never an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use agora_core::config::Config;
use agora_core::protocol::{AssistantInfo, Configurable};
use agora_core::types::{ChatMessage, ConversationHistory};
use agora_providers::{Completer, OpenAiCompleter};

pub mod backend;
pub mod philosopher;
pub mod prompt;
pub mod proxy;

pub use backend::{BackendClient, BackendError, HttpBackendClient};
pub use philosopher::PhilosopherAgent;
pub use proxy::BackendProxyAgent;

/// What an agent returns for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Final {
    /// The reply shown to the caller.
    pub value: ChatMessage,
    /// History to hand back as `previous` next turn; `None` saves nothing.
    pub save: Option<ConversationHistory>,
}

#[async_trait]
pub trait AgentEntrypoint: Send + Sync {
    /// Assistant id used to address this agent.
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        previous: Option<ConversationHistory>,
        configurable: &Configurable,
    ) -> Final;
}

/// Agents addressable by assistant id.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn AgentEntrypoint>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn AgentEntrypoint>) {
        self.agents.insert(agent.id().to_string(), agent);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn AgentEntrypoint>> {
        self.agents.get(id).cloned()
    }

    pub fn list(&self) -> Vec<AssistantInfo> {
        self.agents
            .values()
            .map(|agent| AssistantInfo {
                assistant_id: agent.id().to_string(),
                graph_id: Some(agent.id().to_string()),
                name: Some(agent.id().to_string()),
                description: Some(agent.description().to_string()),
            })
            .collect()
    }

    /// The built-in agents wired to the configured model and backend.
    pub fn from_config(config: &Config) -> Self {
        let completer: Arc<dyn Completer> = Arc::new(
            OpenAiCompleter::new(
                config.model_name(),
                config.model_api_key(),
                config.model_base_url().as_deref(),
            )
            .with_max_tokens(config.model_max_tokens()),
        );
        let backend = Arc::new(HttpBackendClient::from_config(config));

        let mut registry = Self::new();
        registry.register(Arc::new(PhilosopherAgent::new(completer.clone())));
        registry.register(Arc::new(BackendProxyAgent::new(backend, Some(completer))));
        registry
    }
}
