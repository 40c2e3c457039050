//! `agora talk`: one-shot and interactive conversations.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use agora_client::{
    HttpRunService, ReconciliationResult, SendOptions, SessionManager, send_message,
};

use crate::console::{ConsoleSink, reply_lines};

/// One parsed line of interactive input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Reset,
    Message(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line.to_lowercase().as_str() {
        "/exit" | ":q" | "quit" | "exit" => Input::Quit,
        "/reset" | "/new" => Input::Reset,
        _ => Input::Message(line.to_string()),
    }
}

/// Everything a conversation needs, fixed for its lifetime.
pub struct Talk {
    pub base_url: String,
    pub service: HttpRunService,
    pub sessions: SessionManager,
    pub options: SendOptions,
    pub debug_stream: bool,
}

impl Talk {
    async fn send(&self, text: &str, session_id: Option<String>) -> ReconciliationResult {
        let mut sink = ConsoleSink::new(self.options.stream_mode, self.debug_stream);
        let result = send_message(
            &self.service,
            &self.sessions,
            &self.options,
            text,
            session_id,
            &mut sink,
        )
        .await;
        sink.finish();
        result
    }

    /// Send a single message and print the reply.
    pub async fn one_shot(&self, text: &str, reset: bool) {
        let session = self.sessions.ensure(&self.service, reset).await;
        println!(
            "Sending to {} @ {} (thread={})\n",
            self.options.assistant_id,
            self.base_url,
            session.as_deref().unwrap_or("threadless")
        );

        let result = self.send(text, session).await;
        println!();
        for line in reply_lines(&result, self.options.stream_mode) {
            println!("{line}");
        }
    }

    /// Read-send-print loop until quit, EOF or Ctrl-C.
    pub async fn interactive(&self, reset: bool) -> anyhow::Result<()> {
        println!("Connecting to {}", self.base_url);
        println!("Assistant: {}", self.options.assistant_id);
        println!("Type your message and press Enter.");
        println!("Commands: /exit to quit, /reset to start a new thread");

        let mut session = self.sessions.ensure(&self.service, reset).await;
        if let Some(ref id) = session {
            println!("Thread: {id}");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("You: ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                println!("\nExiting.");
                return Ok(());
            };

            let text = match parse_input(&line) {
                Input::Empty => continue,
                Input::Quit => {
                    println!("Goodbye!");
                    return Ok(());
                }
                Input::Reset => {
                    session = self.sessions.ensure(&self.service, true).await;
                    println!(
                        "Started a new thread. Thread: {}",
                        session.as_deref().unwrap_or("threadless")
                    );
                    continue;
                }
                Input::Message(text) => text,
            };

            let result = tokio::select! {
                result = self.send(&text, session.clone()) => result,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nInterrupted.");
                    return Ok(());
                }
            };

            if let Some(ref id) = result.updated_session_id {
                info!(session_id = %id, "Session replaced");
                session = Some(id.clone());
                println!("(Thread switched) Thread: {id}");
            }
            for line in reply_lines(&result, self.options.stream_mode) {
                println!("{line}");
            }
        }
    }
}
