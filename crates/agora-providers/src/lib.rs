//! LLM completion abstraction.
//!
//! Agents only need one thing from a model: turn a transcript plus a system
//! prompt into reply text. Each backend implements [`Completer`].

use async_trait::async_trait;

use agora_core::types::ChatMessage;

pub mod openai;
pub mod sse;

pub use openai::OpenAiCompleter;

/// Produces a single reply for a transcript.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Backend identifier (e.g. "openai").
    fn id(&self) -> &str;

    /// Complete `messages` under `system_prompt` and return the reply text.
    async fn complete(&self, messages: &[ChatMessage], system_prompt: &str)
    -> anyhow::Result<String>;
}
