//! One logical send: run the stream, reconcile it, recover from session loss.
//!
//! At most three runs happen per send:
//!
//! | state          | session-missing error (with a session) | other error | success |
//! |----------------|-----------------------------------------|-------------|---------|
//! | `Primary`      | -> `FreshSession`                       | terminal    | result  |
//! | `FreshSession` | -> `Sessionless`                        | terminal    | result + new id |
//! | `Sessionless`  | terminal                                | terminal    | result  |

use tokio_stream::StreamExt;
use tracing::{info, warn};

use agora_core::protocol::{RunConfig, StreamMode};
use agora_core::types::ChatMessage;

use crate::audit::StreamAuditLog;
use crate::error::RunError;
use crate::reconcile::{ReconciliationResult, Reconciler};
use crate::session::SessionManager;
use crate::sink::StreamSink;
use crate::transport::{RunRequest, RunService};

/// Where a send is in its recovery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    /// A new session was forced after the first one went missing.
    FreshSession,
    /// Last resort: no session at all.
    Sessionless,
}

impl Attempt {
    /// Next state after a session-missing error, or `None` when recovery is exhausted.
    pub fn after_session_missing(self) -> Option<Attempt> {
        match self {
            Attempt::Primary => Some(Attempt::FreshSession),
            Attempt::FreshSession => Some(Attempt::Sessionless),
            Attempt::Sessionless => None,
        }
    }
}

/// Per-send settings that do not change between turns.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub assistant_id: String,
    pub user_email: String,
    pub stream_mode: StreamMode,
    pub audit: Option<StreamAuditLog>,
}

/// Send `text` and reconcile the streamed reply.
///
/// Never fails: unrecoverable errors are logged and yield an empty result.
/// `updated_session_id` is set only when a fresh session completed the send.
pub async fn send_message(
    service: &dyn RunService,
    sessions: &SessionManager,
    options: &SendOptions,
    text: &str,
    session_id: Option<String>,
    sink: &mut dyn StreamSink,
) -> ReconciliationResult {
    let mut attempt = Attempt::Primary;
    let mut session = session_id;

    loop {
        let outcome = run_once(service, options, text, session.as_deref(), sink).await;
        let error = match outcome {
            Ok(mut result) => {
                if attempt == Attempt::FreshSession {
                    result.updated_session_id = session;
                }
                return result;
            }
            Err(e) => e,
        };

        let next = if session.is_some() && error.is_session_missing() {
            attempt.after_session_missing()
        } else {
            None
        };
        let Some(next) = next else {
            warn!(%error, ?attempt, assistant = %options.assistant_id, "Run failed");
            return ReconciliationResult::empty();
        };

        session = match next {
            Attempt::FreshSession => {
                warn!(%error, "Session not found, creating a new one and retrying");
                sessions.ensure(service, true).await
            }
            Attempt::Primary | Attempt::Sessionless => {
                warn!(%error, "Session not found again, retrying without a session");
                None
            }
        };
        attempt = next;
        info!(?attempt, has_session = session.is_some(), "Retrying send");
    }
}

/// One run attempt. Any error, including one midway through the stream, discards partial state.
async fn run_once(
    service: &dyn RunService,
    options: &SendOptions,
    text: &str,
    session_id: Option<&str>,
    sink: &mut dyn StreamSink,
) -> Result<ReconciliationResult, RunError> {
    let mut message = ChatMessage::user(text);
    if let Some(id) = session_id {
        message = message.with_session_hint(id);
    }

    let request = RunRequest {
        session_id: session_id.map(str::to_string),
        assistant_id: options.assistant_id.clone(),
        message,
        stream_mode: options.stream_mode,
        config: RunConfig::for_session(&options.user_email, session_id),
    };

    let mut events = service.stream_run(request).await?;
    let mut reconciler = Reconciler::new();

    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(ref audit) = options.audit {
            audit.append(&event).await;
        }
        sink.on_event(&event);
        reconciler.apply(&event, sink);
    }

    Ok(reconciler.finish())
}
