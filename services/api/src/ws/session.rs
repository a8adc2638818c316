//! Manages the WebSocket connection lifecycle for a chat session.

use super::{
    protocol::{ClientMessage, ProtocolError, ServerMessage},
    relay::Relay,
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chatvox_core::session::SessionStore;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

/// Inbound frames waiting for the relay worker.
const INBOUND_QUEUE: usize = 32;
/// Outbound events waiting for the socket writer.
const OUTBOUND_QUEUE: usize = 32;

/// A decoded inbound frame, or the reason it could not be decoded.
type Inbound = Result<ClientMessage, ProtocolError>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handler for the server root: upgrade requests become chat sessions, plain
/// requests get the client shell.
pub async fn root_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match upgrade {
        Ok(ws) => ws.on_upgrade(|socket| handle_socket(socket, state)),
        Err(_) => {
            let index = state.config.static_dir.join("index.html");
            match tokio::fs::read_to_string(&index).await {
                Ok(html) => Html(html).into_response(),
                Err(e) => {
                    warn!("Client shell unavailable at {}: {}", index.display(), e);
                    StatusCode::NOT_FOUND.into_response()
                }
            }
        }
    }
}

/// Main handler for an individual WebSocket connection.
///
/// Creates the session, then runs three pieces until the client goes away:
/// this reader loop, a relay worker that processes queued events one at a
/// time in arrival order, and a writer that forwards outbound events to the
/// socket. The session is destroyed as soon as the reader stops.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session = state.sessions.create();
    let session_id = session.id();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!(live_sessions = state.sessions.len(), "Client connected");

    let (socket_tx, mut socket_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);

    tokio::spawn(run_writer(socket_tx, outbound_rx).in_current_span());
    tokio::spawn(
        run_relay_worker(
            state.relay.clone(),
            state.sessions.clone(),
            session_id,
            inbound_rx,
            outbound_tx,
        )
        .in_current_span(),
    );

    while let Some(msg_result) = socket_rx.next().await {
        let inbound: Inbound = match msg_result {
            Ok(Message::Text(text)) => ClientMessage::parse(text.as_str()),
            Ok(Message::Binary(_)) => Err(ProtocolError::BinaryFrame),
            Ok(Message::Close(_)) => {
                info!("Client sent close frame.");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                warn!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };
        if inbound_tx.send(inbound).await.is_err() {
            error!("Relay worker stopped unexpectedly.");
            break;
        }
    }

    drop(inbound_tx);
    state.sessions.destroy(session_id);
    info!(live_sessions = state.sessions.len(), "Client disconnected");
}

/// Processes queued inbound frames for one session, strictly in order.
///
/// A gateway call already in flight when the client disconnects runs to
/// completion; its events go nowhere because the writer has stopped. Frames
/// still queued for a destroyed session are dropped.
async fn run_relay_worker(
    relay: Arc<Relay>,
    sessions: SessionStore,
    session_id: Uuid,
    mut inbound_rx: mpsc::Receiver<Inbound>,
    outbound_tx: mpsc::Sender<ServerMessage>,
) {
    while let Some(inbound) = inbound_rx.recv().await {
        let Some(handle) = sessions.get(session_id) else {
            debug!("Session closed; dropping queued events.");
            break;
        };
        match inbound {
            Ok(message) => {
                let mut session = handle.lock().await;
                relay.handle(&mut session, message, &outbound_tx).await;
            }
            Err(e) => relay.reject(e, &outbound_tx).await,
        }
    }
    debug!("Relay worker finished.");
}

/// Forwards outbound events to the client until either side closes.
async fn run_writer(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = send_msg(&mut socket_tx, msg).await {
            debug!("Stopped writing to client: {:?}", e);
            return;
        }
    }
    let _ = socket_tx.close().await;
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
