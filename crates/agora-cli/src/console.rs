//! Terminal rendering of streamed runs.

use std::io::Write;

use serde_json::Value;

use agora_client::audit::debug_line;
use agora_client::reconcile::METADATA_MARKER;
use agora_client::{ReconciliationResult, StreamEvent, StreamSink};
use agora_core::protocol::StreamMode;
use agora_core::types::Metadata;

pub const NO_RESPONSE: &str = "Agent: <no response>";

fn flush() {
    let _ = std::io::stdout().flush();
}

/// Marker payload worth printing: only structured values are shown.
fn printable_marker(value: Option<&Value>) -> Option<String> {
    value
        .filter(|v| v.is_object() || v.is_array())
        .map(|v| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
}

/// Prints surfaced content to stdout as it arrives.
pub struct ConsoleSink {
    mode: StreamMode,
    debug_stream: bool,
    printed: bool,
}

impl ConsoleSink {
    pub fn new(mode: StreamMode, debug_stream: bool) -> Self {
        Self {
            mode,
            debug_stream,
            printed: false,
        }
    }

    /// Close the streamed line, if anything was written on it.
    pub fn finish(&self) {
        if self.printed {
            println!();
        }
    }
}

impl StreamSink for ConsoleSink {
    fn on_token(&mut self, fragment: &str) {
        print!("{fragment}");
        flush();
        self.printed = true;
    }

    fn on_message(&mut self, text: &str) {
        print!("\n{text}");
        flush();
        self.printed = true;
    }

    fn on_metadata(&mut self, metadata: &Metadata) {
        if self.mode != StreamMode::FullUpdates {
            return;
        }
        if let Some(pretty) = printable_marker(metadata.get(METADATA_MARKER)) {
            println!("\nMetadata (irbot):");
            println!("{pretty}");
        }
    }

    fn on_event(&mut self, event: &StreamEvent) {
        if self.debug_stream {
            println!("{}", debug_line(event));
        }
    }
}

/// Lines printed after a turn completes.
///
/// Nothing is printed for an empty update-mode result whose content was
/// already shown inline.
pub fn reply_lines(result: &ReconciliationResult, mode: StreamMode) -> Vec<String> {
    if result.final_text.is_empty() {
        if mode == StreamMode::FullUpdates && result.any_partial_content_emitted {
            return Vec::new();
        }
        return vec![NO_RESPONSE.to_string()];
    }

    let mut lines = vec![format!("Agent: {}", result.final_text)];
    if let Some(pretty) = printable_marker(result.marked_metadata()) {
        lines.push("Metadata (irbot):".to_string());
        lines.push(pretty);
    }
    lines
}
