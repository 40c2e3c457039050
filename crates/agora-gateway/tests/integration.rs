//! Dev host integration tests: start a real server and drive it with the HTTP client.
//!
//! Run with: `cargo test -p agora-gateway --test integration`

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use agora_agents::{AgentEntrypoint, AgentRegistry, Final};
use agora_client::{HttpRunService, NullSink, RunService, SendOptions, SessionManager, send_message};
use agora_core::protocol::{Configurable, StreamMode};
use agora_core::types::{ChatMessage, ConversationHistory, Metadata};
use agora_gateway::GatewayState;

/// Replies with the turn count and the last user text; keeps the whole history.
struct CountingAgent;

#[async_trait]
impl AgentEntrypoint for CountingAgent {
    fn id(&self) -> &str {
        "counter"
    }

    fn description(&self) -> &str {
        "counts turns"
    }

    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        previous: Option<ConversationHistory>,
        _configurable: &Configurable,
    ) -> Final {
        let mut history = previous.unwrap_or_default();
        let last = messages.last().map(ChatMessage::text).unwrap_or_default();
        history.extend(messages);
        let reply = ChatMessage::assistant(format!("turn {} says {last}", history.len().div_ceil(2)));
        history.push(reply.clone());
        Final {
            value: reply,
            save: Some(history),
        }
    }
}

/// Reports the session it saw and tags its reply with marked metadata.
struct SessionEchoAgent;

#[async_trait]
impl AgentEntrypoint for SessionEchoAgent {
    fn id(&self) -> &str {
        "session-echo"
    }

    fn description(&self) -> &str {
        "echoes the session id"
    }

    async fn invoke(
        &self,
        _messages: Vec<ChatMessage>,
        _previous: Option<ConversationHistory>,
        configurable: &Configurable,
    ) -> Final {
        let session = configurable.thread_id.clone().unwrap_or_else(|| "none".into());
        let mut metadata = Metadata::new();
        metadata.insert("irbot".into(), json!({"session": session}));
        Final {
            value: ChatMessage::assistant(format!("session is {session}")).with_metadata(metadata),
            save: None,
        }
    }
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn start_test_gateway() -> String {
    let port = find_free_port();

    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(CountingAgent));
    agents.register(Arc::new(SessionEchoAgent));
    let state = Arc::new(GatewayState::new(agents));

    tokio::spawn(async move {
        let _ = agora_gateway::start_gateway(state, "127.0.0.1", port).await;
    });

    let base = format!("http://127.0.0.1:{port}");
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if reqwest::get(format!("{base}/ok")).await.is_ok() {
            break;
        }
    }
    base
}

fn options(assistant: &str, mode: StreamMode) -> SendOptions {
    SendOptions {
        assistant_id: assistant.into(),
        user_email: "test@example.com".into(),
        stream_mode: mode,
        audit: None,
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_gateway().await;

    let resp = reqwest::get(format!("{base}/ok")).await.unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_list_assistants() {
    let base = start_test_gateway().await;
    let service = HttpRunService::new(&base);

    let assistants = service.list_assistants().await.unwrap();
    let ids: Vec<&str> = assistants.iter().map(|a| a.assistant_id.as_str()).collect();
    assert_eq!(ids, vec!["counter", "session-echo"]);
    assert_eq!(assistants[0].description.as_deref(), Some("counts turns"));
}

#[tokio::test]
async fn test_every_stream_mode_reconciles_to_the_reply() {
    let base = start_test_gateway().await;
    let service = HttpRunService::new(&base);
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionManager::new(dir.path().join("thread.txt"));

    for mode in [
        StreamMode::Snapshots,
        StreamMode::FullUpdates,
        StreamMode::Tokens,
        StreamMode::RawEvents,
    ] {
        let result = send_message(
            &service,
            &sessions,
            &options("counter", mode),
            "hello there",
            None,
            &mut NullSink,
        )
        .await;
        assert_eq!(result.final_text, "turn 1 says hello there", "mode {mode}");
        assert!(result.updated_session_id.is_none());
    }
}

#[tokio::test]
async fn test_thread_history_accumulates() {
    let base = start_test_gateway().await;
    let service = HttpRunService::new(&base);
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionManager::new(dir.path().join("thread.txt"));

    let session = sessions.ensure(&service, false).await;
    assert!(session.is_some());
    assert_eq!(sessions.load().await, session);

    let opts = options("counter", StreamMode::Snapshots);
    let first = send_message(&service, &sessions, &opts, "one", session.clone(), &mut NullSink).await;
    let second = send_message(&service, &sessions, &opts, "two", session.clone(), &mut NullSink).await;

    assert_eq!(first.final_text, "turn 1 says one");
    assert_eq!(second.final_text, "turn 2 says two");
}

#[tokio::test]
async fn test_unknown_thread_recovers_with_fresh_session() {
    let base = start_test_gateway().await;
    let service = HttpRunService::new(&base);
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionManager::new(dir.path().join("thread.txt"));

    let result = send_message(
        &service,
        &sessions,
        &options("session-echo", StreamMode::FullUpdates),
        "hi",
        Some("stale-thread".into()),
        &mut NullSink,
    )
    .await;

    let fresh = result.updated_session_id.clone().unwrap();
    assert_ne!(fresh, "stale-thread");
    assert_eq!(result.final_text, format!("session is {fresh}"));
    assert_eq!(result.marked_metadata(), Some(&json!({"session": fresh.clone()})));
    assert_eq!(sessions.load().await.as_deref(), Some(fresh.as_str()));
}

#[tokio::test]
async fn test_token_stream_keeps_marked_metadata() {
    let base = start_test_gateway().await;
    let service = HttpRunService::new(&base);
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionManager::new(dir.path().join("thread.txt"));

    let result = send_message(
        &service,
        &sessions,
        &options("session-echo", StreamMode::Tokens),
        "hi",
        None,
        &mut NullSink,
    )
    .await;

    assert_eq!(result.final_text, "session is none");
    assert!(result.any_partial_content_emitted);
    assert_eq!(result.marked_metadata(), Some(&json!({"session": "none"})));
}

#[tokio::test]
async fn test_unknown_assistant_is_not_found() {
    let base = start_test_gateway().await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/runs/stream"))
        .json(&json!({"assistant_id": "ghost", "input": {"messages": []}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("ghost"));

    let service = HttpRunService::new(&base);
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionManager::new(dir.path().join("thread.txt"));
    let result = send_message(
        &service,
        &sessions,
        &options("ghost", StreamMode::Snapshots),
        "hi",
        None,
        &mut NullSink,
    )
    .await;
    assert!(result.final_text.is_empty());
}
