//! Dev host shared state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use agora_agents::AgentRegistry;
use agora_core::types::ConversationHistory;

/// One thread created through `POST /threads`.
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub created_at: DateTime<Utc>,
    /// What the last run's agent asked to save; `None` until then.
    pub history: Option<ConversationHistory>,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            history: None,
        }
    }
}

/// Shared state accessible from all handlers.
pub struct GatewayState {
    pub agents: AgentRegistry,
    threads: RwLock<HashMap<String, ThreadState>>,
}

impl GatewayState {
    pub fn new(agents: AgentRegistry) -> Self {
        Self {
            agents,
            threads: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fresh thread and return its id.
    pub async fn create_thread(&self) -> (String, DateTime<Utc>) {
        let id = uuid::Uuid::new_v4().to_string();
        let thread = ThreadState::new();
        let created_at = thread.created_at;
        self.threads.write().await.insert(id.clone(), thread);
        (id, created_at)
    }

    /// Saved history of a thread. The outer `None` means the thread does not exist.
    pub async fn thread_history(&self, id: &str) -> Option<Option<ConversationHistory>> {
        self.threads
            .read()
            .await
            .get(id)
            .map(|thread| thread.history.clone())
    }

    /// Replace a thread's saved history. Unknown threads are left alone.
    pub async fn save_history(&self, id: &str, history: Option<ConversationHistory>) {
        if let Some(thread) = self.threads.write().await.get_mut(id) {
            thread.history = history;
        }
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::types::ChatMessage;

    #[tokio::test]
    async fn test_thread_lifecycle() {
        let state = GatewayState::new(AgentRegistry::new());
        assert!(state.thread_history("nope").await.is_none());

        let (id, _) = state.create_thread().await;
        assert_eq!(state.thread_history(&id).await, Some(None));

        let history = ConversationHistory::from(vec![ChatMessage::user("hi")]);
        state.save_history(&id, Some(history.clone())).await;
        assert_eq!(state.thread_history(&id).await, Some(Some(history)));

        state.save_history("nope", None).await;
        assert_eq!(state.thread_count().await, 1);
    }
}
