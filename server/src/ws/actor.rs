use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::config::HeartbeatConfig;
use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::{ClientConnection, ConnectionSender};

/// Close code sent when the peer stops answering pings.
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer gets to flush a queued close frame before it is aborted.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the actor-per-connection pattern for an admitted WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, drains the connection's outbound queue
/// - Heartbeat task: pings the client and resolves if a pong is overdue
/// - Reader loop (this task): parses location reports and feeds the relay
///
/// The reader loop also stops when the registry closes the connection (a newer
/// connection took over the identity). When the reader loop ends the identity
/// is evicted and the departure broadcast.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (connection, rx) = ClientConnection::channel(state.outbound_queue);
    let conn_id = connection.id;
    let tx = connection.sender();
    let closed = connection.closed_token();

    state.relay.admit(&user_id, connection);

    tracing::info!(
        user_id = %user_id,
        conn_id,
        connections = state.relay.connection_count(),
        "WebSocket actor started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut heartbeat_handle = tokio::spawn(heartbeat_task(tx.clone(), pong_rx, state.heartbeat));

    // Set when a close frame was queued by the server and should reach the client.
    let mut flush_close = false;

    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = &mut heartbeat_handle => {
                tracing::warn!(user_id = %user_id, conn_id, "Pong timeout, closing connection");
                flush_close = true;
                break;
            }
            _ = closed.cancelled() => {
                tracing::info!(user_id = %user_id, conn_id, "Superseded, closing connection");
                flush_close = true;
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_location_message(
                        &state.relay,
                        &user_id,
                        text.as_str().as_bytes(),
                    );
                }
                Message::Binary(data) => {
                    protocol::handle_location_message(&state.relay, &user_id, &data);
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.try_send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    heartbeat_handle.abort();
    if flush_close {
        // The writer exits on its own once the close frame is written.
        let _ = timeout(CLOSE_FLUSH_TIMEOUT, &mut writer_handle).await;
    }
    writer_handle.abort();

    let evicted = state.relay.disconnect(&user_id, conn_id);

    tracing::info!(
        user_id = %user_id,
        conn_id,
        evicted,
        "WebSocket actor stopped"
    );
}

/// Writer task: forwards queued messages to the WebSocket sink.
/// Stops after a close frame or the first failed write.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || is_close {
            break;
        }
    }
    let _ = ws_sender.close().await;
}

/// Heartbeat task: pings on every interval and returns once a pong is overdue.
/// A ping that cannot be queued within the pong timeout counts as a missed pong.
/// With the heartbeat disabled it never returns.
async fn heartbeat_task(
    tx: ConnectionSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    config: HeartbeatConfig,
) {
    if !config.enabled() {
        std::future::pending::<()>().await;
    }

    let mut ping_timer = interval(config.ping_interval());
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        let ping = Message::Ping(vec![1, 2, 3, 4].into());
        match timeout(config.pong_timeout(), tx.send(ping)).await {
            Ok(Ok(())) => {}
            // Writer task has died; the reader will see the socket end.
            Ok(Err(_)) => std::future::pending::<()>().await,
            Err(_) => {
                tracing::debug!("Outbound queue stayed full, ping not sent");
                return;
            }
        }

        match timeout(config.pong_timeout(), pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                let _ = tx.try_send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "Pong timeout".into(),
                })));
                return;
            }
        }
    }
}
