use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use framewatch_core::pipeline::app_context::AppContext;
use framewatch_core::session::domain::session::ConnectionId;

/// Replies waiting to be written to one socket. A slow reader stalls its own
/// receive loop once this fills.
pub const OUTBOUND_QUEUE: usize = 4;

pub struct ServerState {
    pub ctx: AppContext,
    pub max_payload_size: usize,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

/// `{"event": <name>, "data": <payload>}`, the shape of every text message.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to serialize {} event: {e}", self.event);
            String::new()
        })
    }
}

/// What an inbound text message asks for.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Frame(String),
    Ignored(String),
}

/// Parses an inbound envelope. `Err` carries the message for an `error` reply.
pub fn parse_inbound(text: &str) -> Result<Inbound, String> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| format!("malformed message: {e}"))?;
    match envelope.event.as_str() {
        "process_frame" => match envelope.data {
            Value::String(image) => Ok(Inbound::Frame(image)),
            _ => Err("malformed message: process_frame data must be a string".into()),
        },
        // Older clients wrap the image in an object.
        "video_frame" => match envelope.data {
            Value::Object(mut fields) => match fields.remove("image") {
                Some(Value::String(image)) => Ok(Inbound::Frame(image)),
                _ => Err("malformed message: video_frame data needs an image string".into()),
            },
            Value::String(image) => Ok(Inbound::Frame(image)),
            _ => Err("malformed message: video_frame data needs an image string".into()),
        },
        _ => Ok(Inbound::Ignored(envelope.event)),
    }
}

/// Turns one inbound text message into at most one outbound message.
pub async fn respond(ctx: &AppContext, id: ConnectionId, text: &str) -> Option<String> {
    match parse_inbound(text) {
        Ok(Inbound::Frame(image)) => {
            let outcome = ctx.submit_frame(id, image).await;
            Some(Envelope::new(outcome.event(), Value::String(outcome.payload().to_string())).to_text())
        }
        Ok(Inbound::Ignored(event)) => {
            log::debug!("{id}: ignoring '{event}' event");
            None
        }
        Err(message) => {
            log::debug!("{id}: {message}");
            Some(Envelope::new("error", Value::String(message)).to_text())
        }
    }
}

pub fn outbound_channel() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    mpsc::channel(OUTBOUND_QUEUE)
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub fn health(ctx: &AppContext) -> Value {
    json!({
        "status": "ok",
        "model": if ctx.model_ready() { "ready" } else { "unavailable" },
        "sessions": ctx.sessions().len(),
    })
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(health(&state.ctx))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.max_message_size(state.max_payload_size)
        .max_frame_size(state.max_payload_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let id = state.ctx.connect();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = outbound_channel();

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sender.send(message).await {
                log::debug!("{id}: send failed: {e}");
                break;
            }
        }
    });

    let status = Envelope::new("status", json!({ "status": "connected" }));
    let _ = tx.send(Message::Text(status.to_text())).await;

    let mut ping = tokio::time::interval(state.ping_interval);
    ping.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    // Awaiting here keeps this connection's frames in arrival order.
                    if let Some(reply) = respond(&state.ctx, id, &text).await {
                        if tx.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    last_seen = Instant::now();
                    log::debug!("{id}: ignoring binary message");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    last_seen = Instant::now();
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    log::debug!("{id}: websocket error: {e}");
                    break;
                }
            },
            _ = ping.tick() => {
                if last_seen.elapsed() > state.ping_timeout {
                    log::info!("{id}: no traffic for {}s, closing", state.ping_timeout.as_secs());
                    break;
                }
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.ctx.disconnect(id);
    drop(tx);
    let _ = send_task.await;
}

/// Binds the listener and serves until Ctrl-C.
pub async fn serve(
    state: Arc<ServerState>,
    addr: std::net::SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on ws://{addr}/ws");
    axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    state.ctx.report();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
