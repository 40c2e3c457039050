//! Axum-based run server.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use agora_core::protocol::RunRequestBody;
use agora_core::types::ChatMessage;

use crate::events::{RunEvent, render};
use crate::state::GatewayState;

const EVENT_BUFFER: usize = 32;

/// Routes of the run protocol, ready to serve.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ok", get(health_handler))
        .route("/threads", post(create_thread))
        .route("/threads/{thread_id}/runs/stream", post(thread_run_stream))
        .route("/runs/stream", post(run_stream))
        .route("/assistants/search", post(search_assistants))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the dev host and serve until Ctrl+C.
pub async fn start_gateway(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(assistants = state.agents.list().len(), "Gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn not_found(detail: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "threads": state.thread_count().await,
    }))
}

async fn create_thread(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (thread_id, created_at) = state.create_thread().await;
    debug!(%thread_id, "Thread created");
    Json(json!({
        "thread_id": thread_id,
        "created_at": created_at.to_rfc3339(),
        "metadata": {},
    }))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

async fn search_assistants(State(state): State<Arc<GatewayState>>, body: Bytes) -> impl IntoResponse {
    let query: SearchQuery = serde_json::from_slice(&body).unwrap_or_default();
    let assistants: Vec<_> = state
        .agents
        .list()
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Json(assistants)
}

async fn thread_run_stream(
    State(state): State<Arc<GatewayState>>,
    Path(thread_id): Path<String>,
    Json(body): Json<RunRequestBody>,
) -> Response {
    start_run(state, Some(thread_id), body).await
}

async fn run_stream(State(state): State<Arc<GatewayState>>, Json(body): Json<RunRequestBody>) -> Response {
    start_run(state, None, body).await
}

/// Validate a run, then stream `metadata`, the mode's events and `end`.
///
/// The agent runs on a spawned task so the metadata event goes out before
/// the reply is ready.
async fn start_run(state: Arc<GatewayState>, thread_id: Option<String>, body: RunRequestBody) -> Response {
    let Some(agent) = state.agents.get(&body.assistant_id) else {
        warn!(assistant_id = %body.assistant_id, "Run for unknown assistant");
        return not_found(format!("Assistant '{}' not found", body.assistant_id));
    };

    let previous = match thread_id {
        Some(ref id) => match state.thread_history(id).await {
            Some(history) => history,
            None => {
                warn!(thread_id = %id, "Run on unknown thread");
                return not_found(format!("Thread '{id}' not found"));
            }
        },
        None => None,
    };

    let input = ChatMessage::list_from_wire(&body.input);
    let mode = body.stream_mode;
    let mut configurable = body.config.configurable;
    if let Some(ref id) = thread_id {
        configurable.thread_id = Some(id.clone());
    }
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(%run_id, assistant_id = %body.assistant_id, thread_id = ?thread_id, %mode, "Run started");

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(EVENT_BUFFER);
    tokio::spawn(async move {
        let send = |event: RunEvent| {
            let tx = tx.clone();
            async move {
                let frame = Event::default().event(event.name).data(event.data.to_string());
                tx.send(Ok(frame)).await.is_ok()
            }
        };

        if !send(RunEvent::metadata(&run_id, thread_id.as_deref())).await {
            debug!(%run_id, "Client went away before the run started");
            return;
        }

        let result = agent.invoke(input.clone(), previous, &configurable).await;
        if let Some(ref id) = thread_id {
            state.save_history(id, result.save.clone()).await;
        }

        for event in render(mode, &input, result.save.as_ref(), &result.value) {
            if !send(event).await {
                debug!(%run_id, "Client went away mid-run");
                return;
            }
        }
        send(RunEvent::end()).await;
        debug!(%run_id, "Run finished");
    });

    Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(%e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
