//! Raw event audit log and debug echo.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::event::StreamEvent;

const PREVIEW_KEYS: usize = 6;
const PREVIEW_CHARS: usize = 120;

/// Appends one JSON line per stream event: `{"ts", "event", "data"}`.
///
/// Best-effort: write failures are logged at debug level and never abort the run.
#[derive(Debug, Clone)]
pub struct StreamAuditLog {
    path: PathBuf,
}

impl StreamAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn append(&self, event: &StreamEvent) {
        if let Err(e) = self.write_line(event).await {
            debug!(path = %self.path.display(), %e, "Failed to append stream log");
        }
    }

    async fn write_line(&self, event: &StreamEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = json!({
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            "event": event.name,
            "data": event.payload,
        });
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    }
}

/// Compact preview of a payload: up to six keys for maps, else the type and a text sample.
pub fn preview(payload: &Value) -> String {
    match payload {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().take(PREVIEW_KEYS).map(String::as_str).collect();
            format!("dict keys=[{}]", keys.join(","))
        }
        other => {
            let kind = match other {
                Value::Null => "null",
                Value::Bool(_) => "bool",
                Value::Number(_) => "number",
                Value::String(_) => "str",
                Value::Array(_) => "list",
                Value::Object(_) => "dict",
            };
            let sample = match other {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                value => value.to_string(),
            };
            if sample.is_empty() {
                return kind.to_string();
            }
            let mut clipped: String = sample.chars().take(PREVIEW_CHARS).collect();
            if sample.chars().count() > PREVIEW_CHARS {
                clipped.push('…');
            }
            format!("{kind} content=\"{clipped}\"")
        }
    }
}

/// The `--debug-stream` echo line for an event.
pub fn debug_line(event: &StreamEvent) -> String {
    format!("[stream] event={} data={}", event.name, preview(&event.payload))
}
