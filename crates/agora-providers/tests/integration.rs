//! Completer integration tests.
//!
//! The stand-in server tests always run. The live test is skipped when
//! `OPENAI_API_KEY` is not set.
//! Run with: `cargo test -p agora-providers --test integration`

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use tokio_stream::StreamExt;

use agora_core::types::ChatMessage;
use agora_providers::{Completer, OpenAiCompleter};

fn openai_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

const CHUNKS: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Know \"}}]}\r\n\r\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"thyself.\"}}]}\n\n",
    "data: [DONE]\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
);

async fn completions(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer test-key");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    ([("content-type", "text/event-stream")], CHUNKS).into_response()
}

async fn start_stand_in() -> String {
    let app = Router::new().route("/v1/chat/completions", post(completions));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_stand_in_stream_concatenates_deltas() {
    let base = start_stand_in().await;
    let completer = OpenAiCompleter::new("test-model", Some("test-key".into()), Some(&base));

    let deltas: Vec<String> = completer
        .stream(&[ChatMessage::user("Who are you?")], "Be brief.")
        .await
        .unwrap()
        .map(|d| d.unwrap())
        .collect()
        .await;
    assert_eq!(deltas, vec!["Know ", "thyself."]);

    let reply = completer
        .complete(&[ChatMessage::user("Who are you?")], "")
        .await
        .unwrap();
    assert_eq!(reply, "Know thyself.");
}

#[tokio::test]
async fn test_stand_in_rejects_bad_key() {
    let base = start_stand_in().await;
    let completer = OpenAiCompleter::new("test-model", Some("wrong".into()), Some(&base));

    let err = completer
        .complete(&[ChatMessage::user("hi")], "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_openai_live_completion() {
    let Some(key) = openai_key() else {
        eprintln!("Skipping: OPENAI_API_KEY not set");
        return;
    };

    let completer = OpenAiCompleter::new("gpt-4o-mini", Some(key), None).with_max_tokens(32);
    let reply = completer
        .complete(
            &[ChatMessage::user("Reply with exactly the word 'hello'.")],
            "You are a terse assistant.",
        )
        .await
        .expect("live completion failed");
    assert!(reply.to_lowercase().contains("hello"), "unexpected reply: {reply}");
}
