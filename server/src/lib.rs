//! HTTP front end of the MicroPsi runtime.

pub mod commands;
pub mod rpc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderMap, Method},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use runtime::{LogHub, Runtime};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::rpc::Command;

/// State shared across HTTP handlers and WebSocket tasks.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<Mutex<Runtime>>,
    pub logs: LogHub,
    commands: Arc<Vec<Command>>,
}

impl AppState {
    pub fn new(runtime: Arc<Mutex<Runtime>>, logs: LogHub) -> Self {
        Self {
            runtime,
            logs,
            commands: Arc::new(commands::all()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/rpc/*call", get(rpc_handler).post(rpc_handler))
        .route("/logs", get(log_ws_handler))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

async fn rpc_handler(
    State(state): State<AppState>,
    Path(call): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut runtime = state.runtime.lock().await;
    match rpc::dispatch(&state.commands, &mut runtime, &method, &call, &headers, &body) {
        Ok(outcome) => outcome.into_response(),
        Err(err) => {
            debug!(%call, %err, "remote procedure call rejected");
            err.into_response()
        }
    }
}

async fn log_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("log websocket upgrade initiated");
    ws.on_upgrade(move |socket| handle_log_socket(socket, state.logs))
}

/// Send the buffered log lines, then every new one as it arrives.
async fn handle_log_socket(mut socket: WebSocket, logs: LogHub) {
    let mut rx = logs.subscribe();
    let mut last_sent = None;
    for record in logs.messages_after(None) {
        let Ok(payload) = serde_json::to_string(&record) else {
            continue;
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            return;
        }
        last_sent = Some(record.seq);
    }
    loop {
        tokio::select! {
            record = rx.recv() => {
                match record {
                    Ok(record) => {
                        if last_sent.is_some_and(|seq| record.seq <= seq) {
                            continue;
                        }
                        let Ok(payload) = serde_json::to_string(&record) else {
                            continue;
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    info!("log websocket closed");
}
