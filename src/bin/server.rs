use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use log::Level;
use rank_merge_rust_server::config::GameConfig;
use rank_merge_rust_server::constants::PLAYFIELD_WIDTH;
use rank_merge_rust_server::engine::GameEngine;
use rank_merge_rust_server::logging::{self, emit_log, LogContext};
use rank_merge_rust_server::physics::sandbox::SandboxWorld;
use rank_merge_rust_server::ranks::RANKS;
use rank_merge_rust_server::server_protocol::{parse_client_message, ParsedClientMessage};
use rank_merge_rust_server::server_utils::{
    load_config, make_session_id, normalize_pointer_x, parse_port, resolve_static_dir,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const OUTBOUND_QUEUE: usize = 256;
const DEFAULT_STATIC_DIR: &str = "public";

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct SessionContext {
    tx: mpsc::Sender<OutboundMessage>,
    seed: u32,
    game: GameEngine<SandboxWorld>,
    game_over_sent: bool,
}

struct ServerState {
    config: GameConfig,
    sessions: HashMap<String, SessionContext>,
}

impl ServerState {
    fn new(config: GameConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = logging::init();
    let context = LogContext::default();

    let port = parse_port(std::env::var("PORT").ok().as_deref());
    let config = match load_config(std::env::var("RANK_MERGE_CONFIG").ok().as_deref()) {
        Ok(config) => config,
        Err(error) => {
            emit_log(
                Level::Error,
                "config_load_failed",
                &context,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };

    let state = Arc::new(Mutex::new(ServerState::new(config)));
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/ranks", get(ranks_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let static_dir = resolve_static_dir(
        std::env::var("STATIC_DIR").ok().as_deref(),
        Path::new(DEFAULT_STATIC_DIR),
    );
    let app = if let Some(static_dir) = static_dir {
        emit_log(
            Level::Info,
            "static_root",
            &context,
            json!({ "path": static_dir.to_string_lossy() }),
        );
        let index_file = static_dir.join("index.html");
        app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)))
    } else {
        emit_log(Level::Warn, "static_root_missing", &context, Value::Null);
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            emit_log(
                Level::Error,
                "bind_failed",
                &context,
                json!({ "addr": bind_addr, "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };

    emit_log(Level::Info, "listening", &context, json!({ "port": port }));
    if let Err(error) = axum::serve(listener, app).await {
        emit_log(
            Level::Error,
            "server_failed",
            &context,
            json!({ "error": error.to_string() }),
        );
        std::process::exit(1);
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ranks_handler() -> impl IntoResponse {
    Json(json!({ "ranks": RANKS }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let seed = rand::random::<u32>();
    let session_id = make_session_id(NEXT_ID.fetch_add(1, Ordering::Relaxed), seed);
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE);

    let tick_ms = {
        let mut guard = state.lock().await;
        let config = guard.config.clone();
        let tick_ms = config.tick_ms;
        let game = GameEngine::new(SandboxWorld::default(), config, seed);
        guard.sessions.insert(
            session_id.clone(),
            SessionContext {
                tx: tx.clone(),
                seed,
                game,
                game_over_sent: false,
            },
        );
        send_welcome(&mut guard, &session_id);
        tick_ms
    };
    emit_log(
        Level::Info,
        "session_opened",
        &LogContext::for_session(&session_id).with_seed(seed),
        Value::Null,
    );
    start_session_tick_loop(state.clone(), session_id.clone(), tick_ms);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &session_id, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = std::str::from_utf8(&raw) {
                    handle_client_message(&state, &session_id, text).await;
                } else {
                    let mut guard = state.lock().await;
                    send_error(&mut guard, &session_id, "invalid utf8 message");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    close_session(&state, &session_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, session_id: &str, raw: &str) {
    let mut guard = state.lock().await;
    let Some(message) = parse_client_message(raw) else {
        send_error(&mut guard, session_id, "invalid message");
        return;
    };

    match message {
        ParsedClientMessage::Pointer { x } => {
            if let Some(session) = guard.sessions.get_mut(session_id) {
                if let Some(x) = normalize_pointer_x(x, PLAYFIELD_WIDTH) {
                    session.game.receive_pointer(x);
                }
            }
        }
        ParsedClientMessage::Drop => {
            if let Some(session) = guard.sessions.get_mut(session_id) {
                session.game.request_drop();
            }
        }
        ParsedClientMessage::Retry => {
            let Some(session) = guard.sessions.get_mut(session_id) else {
                return;
            };
            let previous_score = session.game.score();
            session.game.retry();
            session.game_over_sent = false;
            let snapshot = session.game.build_snapshot(true);
            let seed = session.seed;
            send_to_session(
                &mut guard,
                session_id,
                &json!({
                    "type": "state",
                    "snapshot": snapshot,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            emit_log(
                Level::Info,
                "session_retry",
                &LogContext::for_session(session_id).with_seed(seed),
                json!({ "previousScore": previous_score }),
            );
        }
        ParsedClientMessage::Ping { t } => {
            send_to_session(
                &mut guard,
                session_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DropOnFull,
            );
        }
    }
}

fn send_welcome(state: &mut ServerState, session_id: &str) {
    let Some(session) = state.sessions.get_mut(session_id) else {
        return;
    };
    let seed = session.seed;
    let snapshot = session.game.build_snapshot(true);
    let welcome = json!({
        "type": "welcome",
        "sessionId": session_id,
        "seed": seed,
        "config": state.config,
        "ranks": RANKS,
    });
    send_to_session(state, session_id, &welcome, QueuePolicy::DisconnectOnFull);
    send_to_session(
        state,
        session_id,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn start_session_tick_loop(state: SharedState, session_id: String, tick_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            if !tick_session(&mut guard, &session_id, tick_ms) {
                break;
            }
        }
    });
}

/// Returns false once the session is gone.
fn tick_session(state: &mut ServerState, session_id: &str, tick_ms: u64) -> bool {
    let (snapshot, summary) = {
        let Some(session) = state.sessions.get_mut(session_id) else {
            return false;
        };
        if session.game_over_sent {
            return true;
        }
        session.game.step(tick_ms);
        let snapshot = session.game.build_snapshot(true);
        let summary = if session.game.is_ended() {
            session.game_over_sent = true;
            Some(session.game.build_summary())
        } else {
            None
        };
        (snapshot, summary)
    };

    send_to_session(
        state,
        session_id,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    if let Some(summary) = summary {
        emit_log(
            Level::Info,
            "game_over",
            &LogContext::for_session(session_id).with_tick(summary.ticks),
            json!({
                "score": summary.score,
                "merges": summary.merges,
                "highestRankId": summary.highest_rank_id,
            }),
        );
        send_to_session(
            state,
            session_id,
            &json!({
                "type": "game_over",
                "summary": summary,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
    state.sessions.contains_key(session_id)
}

fn send_to_session(state: &mut ServerState, session_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(session) = state.sessions.get(session_id) {
        session
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_session_internal(state, session_id, "outbound queue full");
    }
}

fn send_error(state: &mut ServerState, session_id: &str, message: &str) {
    send_to_session(
        state,
        session_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DropOnFull,
    );
}

fn disconnect_session_internal(state: &mut ServerState, session_id: &str, reason: &str) {
    let Some(session) = state.sessions.remove(session_id) else {
        return;
    };
    let _ = session.tx.try_send(OutboundMessage::Close {
        code: 1013,
        reason: reason.to_string(),
    });
    emit_log(
        Level::Warn,
        "session_dropped",
        &LogContext::for_session(session_id).with_seed(session.seed),
        json!({ "reason": reason, "score": session.game.score() }),
    );
}

async fn close_session(state: &SharedState, session_id: &str) {
    let mut guard = state.lock().await;
    if let Some(session) = guard.sessions.remove(session_id) {
        let summary = session.game.build_summary();
        emit_log(
            Level::Info,
            "session_closed",
            &LogContext::for_session(session_id).with_seed(session.seed),
            json!({
                "score": summary.score,
                "durationMs": summary.duration_ms,
                "ended": session.game.is_ended(),
            }),
        );
    }
}
