//! WebSocket upgrade handlers and per-socket plumbing.
//!
//! Each socket is split: a writer task drains the connection's outbound
//! queue into the sink, and the session consumes decoded inbound text.

use std::future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::connection::ClientConnection;
use super::protocol::Role;
use super::session::Session;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::server::AppState;

/// How long the writer may take to flush after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// GET /client
pub async fn viewer_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state, Role::Viewer)
}

/// GET /server
pub async fn observer_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state, Role::Observer)
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, role: Role) -> Response {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            let conn_id = format!("conn_{}", Uuid::now_v7());
            serve_socket(socket, conn_id, role, state)
        })
}

/// Run one upgraded socket to completion.
#[instrument(skip_all, fields(conn_id = %conn_id, role = %role, token = tracing::field::Empty))]
pub async fn serve_socket(socket: WebSocket, conn_id: String, role: Role, state: AppState) {
    let _ = state.live_connections.fetch_add(1, Ordering::Relaxed);
    metrics::counter!(WS_CONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE, "role" => role.as_str()).increment(1.0);
    info!("client connected");

    let (conn, outbound) = ClientConnection::new(conn_id, role, state.outbound_buffer);
    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_frames(sink, outbound, conn.closing()));

    let peer = Arc::clone(&conn);
    let inbound = stream
        .take_while(move |msg| {
            let open = matches!(msg, Ok(m) if !matches!(m, Message::Close(_)));
            if !open {
                peer.mark_peer_closed();
            }
            future::ready(open)
        })
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.to_string()),
                Ok(Message::Binary(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                _ => None,
            })
        });
    let inbound = std::pin::pin!(inbound);

    let session = Session::new(Arc::clone(&state.ctx), Arc::clone(&conn));
    let reason = session.run(inbound, state.shutdown.clone()).await;

    let _ = conn.close();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        warn!("writer did not finish in time, aborting");
        writer.abort();
    }

    let _ = state.live_connections.fetch_sub(1, Ordering::Relaxed);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE, "role" => role.as_str()).decrement(1.0);
    metrics::counter!(
        WS_DISCONNECTIONS_TOTAL,
        "role" => role.as_str(),
        "reason" => reason.label()
    )
    .increment(1);
    info!(
        reason = reason.label(),
        dropped = conn.drop_count(),
        "client disconnected"
    );
}

/// Forward queued frames to the socket until the connection is closed, then
/// flush what is left and send a close frame.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    closing: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        debug!("socket write failed");
                        return;
                    }
                }
                None => break,
            },
            () = closing.cancelled() => break,
        }
    }
    while let Ok(text) = outbound.try_recv() {
        if sink.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}
