use std::{net::SocketAddr, sync::Arc};

use {
    axum::extract::ws::{CloseFrame, Message, WebSocket},
    futures::{SinkExt, StreamExt},
    tracing::{debug, info, trace, warn},
};

use nexus_protocol::{close_codes, decode_slice};

use crate::{
    auth::authorize_connect,
    connection::{ConnId, Connection, ConnectionState, Frame},
    state::GatewayState,
};

/// Drive one accepted WebSocket from auth gate to close.
///
/// The socket is split: this task reads and routes, a spawned writer drains
/// the connection's outbound queue. Whichever side finishes first ends the
/// connection, and the registry entry is always removed on the way out.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
    token: Option<String>,
) {
    let conn_id = state.next_conn_id();
    let mut phase = ConnectionState::Connecting;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let auth = authorize_connect(&state.auth, token.as_deref());
    if !auth.ok {
        warn!(
            %conn_id,
            %remote_addr,
            reason = auth.reason.unwrap_or_default(),
            "rejecting connection"
        );
        let close = Message::Close(Some(CloseFrame {
            code: close_codes::POLICY_VIOLATION,
            reason: "Unauthorized".to_string().into(),
        }));
        if let Err(e) = ws_tx.send(close).await {
            debug!(%conn_id, error = %e, "failed to send close frame");
        }
        advance(conn_id, &mut phase, ConnectionState::Closed);
        return;
    }
    advance(conn_id, &mut phase, ConnectionState::Authenticated);

    let (conn, mut outbound) = Connection::new(
        conn_id,
        Some(remote_addr),
        state.outbound_buffer,
        state.write_timeout,
    );
    state.registry.add(Arc::new(conn)).await;
    advance(conn_id, &mut phase, ConnectionState::Open);
    info!(%conn_id, %remote_addr, "connection open");

    let write_timeout = state.write_timeout;
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let msg = match frame {
                Frame::Text(text) => Message::Text(text.to_string().into()),
                Frame::Binary(bytes) => Message::Binary(bytes.to_vec().into()),
            };
            match tokio::time::timeout(write_timeout, ws_tx.send(msg)).await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    debug!(%conn_id, error = %e, "socket write failed");
                    break;
                },
                Err(_) => {
                    warn!(%conn_id, ?write_timeout, "socket write timed out, dropping peer");
                    break;
                },
            }
        }
        if let Err(e) = ws_tx.close().await {
            debug!(%conn_id, error = %e, "failed to close socket");
        }
    });

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else {
                    break;
                };
                match msg {
                    Message::Text(text) => dispatch(&state, conn_id, Frame::from(text.as_str())).await,
                    Message::Binary(bytes) => dispatch(&state, conn_id, Frame::from(&bytes[..])).await,
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {},
                }
            }
            _ = &mut writer => break,
        }
    }

    state.router.disconnect(conn_id).await;
    writer.abort();
    advance(conn_id, &mut phase, ConnectionState::Closed);
    info!(%conn_id, "connection closed");
}

async fn dispatch(state: &GatewayState, conn_id: ConnId, raw: Frame) {
    let event = match decode_slice(raw.as_bytes()) {
        Ok(event) => event,
        Err(e) => {
            debug!(%conn_id, error = %e, "ignoring undecodable frame");
            return;
        },
    };
    let outcome = state.router.route(conn_id, raw, &event).await;
    if outcome.report.failed > 0 {
        debug!(
            %conn_id,
            route = ?outcome.route,
            failed = outcome.report.failed,
            "some deliveries failed"
        );
    }
}

fn advance(conn_id: ConnId, phase: &mut ConnectionState, next: ConnectionState) {
    trace!(%conn_id, from = ?*phase, to = ?next, "connection state");
    *phase = next;
}
