//! Fan-out helpers over the per-connection outbound queues.

use std::sync::Arc;

use tracing::{debug, warn};

use huddle_protocol::ServerEvent;

use crate::state::GatewayState;

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "failed to encode server event");
            None
        },
    }
}

/// Send an event to every connection in a group's room, optionally
/// excluding one (a signaling sender never hears its own offer).
/// Returns the number of connections the frame was queued for.
pub async fn to_room(
    state: &Arc<GatewayState>,
    group_id: &str,
    event: &ServerEvent,
    exclude: Option<&str>,
) -> usize {
    let Some(frame) = encode(event) else {
        return 0;
    };
    let targets = state.rooms.read().await.members(group_id);
    let clients = state.clients.read().await;
    let mut delivered = 0;
    for conn_id in targets {
        if exclude == Some(conn_id.as_str()) {
            continue;
        }
        if let Some(client) = clients.get(&conn_id) {
            if client.send(&frame) {
                delivered += 1;
            }
        }
    }
    debug!(group_id, delivered, "room broadcast");
    delivered
}

/// Send an event to a single connection.
pub async fn to_conn(state: &Arc<GatewayState>, conn_id: &str, event: &ServerEvent) -> bool {
    let Some(frame) = encode(event) else {
        return false;
    };
    state
        .clients
        .read()
        .await
        .get(conn_id)
        .map(|client| client.send(&frame))
        .unwrap_or(false)
}
