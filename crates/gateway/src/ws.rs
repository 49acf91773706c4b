//! Per-connection WebSocket plumbing: register, pump outbound frames,
//! dispatch inbound events, clean up on close.

use std::{sync::Arc, time::Instant};

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tracing::{debug, warn},
    uuid::Uuid,
};

use huddle_protocol::{ClientEvent, ErrorShape, ServerEvent, error_codes};

use crate::{
    broadcast, relay,
    state::{ConnectedClient, GatewayState},
};

pub async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state
        .register_client(ConnectedClient {
            conn_id: conn_id.clone(),
            sender: tx,
            connected_at: Instant::now(),
        })
        .await;
    debug!(conn_id, "connection open");

    // Writer task: drain the outbound queue into the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn_id, error = %e, "socket error");
                break;
            },
        };
        match msg {
            Message::Text(text) => match ClientEvent::parse(text.as_str()) {
                Ok(event) => relay::handle_event(&state, &conn_id, event).await,
                Err(e) => {
                    warn!(conn_id, error = %e, "unparseable event frame");
                    let event = ServerEvent::Error(ErrorShape::new(
                        error_codes::INVALID_EVENT,
                        "unrecognized event",
                    ));
                    broadcast::to_conn(&state, &conn_id, &event).await;
                },
            },
            Message::Close(_) => break,
            // Ping/pong is handled by axum; binary frames are not part of
            // the protocol.
            _ => {},
        }
    }

    relay::handle_disconnect(&state, &conn_id).await;
    if let Some(client) = state.remove_client(&conn_id).await {
        debug!(
            conn_id,
            connected_secs = client.connected_at.elapsed().as_secs(),
            "connection closed"
        );
    }
    writer.abort();
}
