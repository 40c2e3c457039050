//! `agora smoke`: exercise a running host end to end and print what streams back.

use anyhow::bail;

use agora_client::{
    HttpRunService, RunService, SendOptions, SessionManager, StreamEvent, StreamSink, send_message,
};
use agora_core::protocol::StreamMode;

const GREETING: &str = "Hello, this is a test message!";

const CONVERSATION: [&str; 3] = [
    "What's the weather like today?",
    "Can you help me with a simple calculation: 15 + 27?",
    "Tell me a short joke",
];

/// Prints each event type as it arrives.
struct EventPrinter;

impl StreamSink for EventPrinter {
    fn on_token(&mut self, _fragment: &str) {}

    fn on_message(&mut self, text: &str) {
        println!("Content: {text}");
    }

    fn on_event(&mut self, event: &StreamEvent) {
        println!("Receiving new event of type: {}...", event.name);
    }
}

pub async fn run(
    service: &HttpRunService,
    sessions: &SessionManager,
    user_email: &str,
) -> anyhow::Result<()> {
    let assistants = service.list_assistants().await?;
    println!("Found {} assistants:", assistants.len());
    for assistant in &assistants {
        println!("  {} ({})", assistant.display_name(), assistant.assistant_id);
    }
    let Some(first) = assistants.first() else {
        bail!("no assistants available at {}", service.base_url());
    };

    let options = SendOptions {
        assistant_id: first.assistant_id.clone(),
        user_email: user_email.to_string(),
        stream_mode: StreamMode::FullUpdates,
        audit: None,
    };

    println!("\n=== Threadless run: {GREETING} ===");
    let result = send_message(service, sessions, &options, GREETING, None, &mut EventPrinter).await;
    println!("Final: {}", result.final_text);

    let mut session = sessions.ensure(service, true).await;
    println!("\nThread: {}", session.as_deref().unwrap_or("threadless"));
    for question in CONVERSATION {
        println!("\n=== {question} ===");
        let result = send_message(service, sessions, &options, question, session.clone(), &mut EventPrinter).await;
        if result.updated_session_id.is_some() {
            session = result.updated_session_id.clone();
        }
        println!("Final: {}", result.final_text);
    }

    Ok(())
}
