use std::{collections::HashMap, sync::Arc, time::Instant};

use tokio::sync::{RwLock, mpsc};

use huddle_store::Store;

use crate::{rooms::RoomRegistry, sessions::SessionRegistry};

// ── Connected client ─────────────────────────────────────────────────────────

/// A WebSocket client currently connected to the gateway.
#[derive(Debug)]
pub struct ConnectedClient {
    pub conn_id: String,
    /// Channel for sending serialized frames to this client's write loop.
    pub sender: mpsc::UnboundedSender<String>,
    pub connected_at: Instant,
}

impl ConnectedClient {
    /// Send a serialized JSON frame to this client. Unbuffered, no flow
    /// control: a slow reader drops off when its socket closes.
    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
pub struct GatewayState {
    /// All connected WebSocket clients, keyed by conn_id.
    pub clients: RwLock<HashMap<String, ConnectedClient>>,
    /// conn_id ↔ authenticated user bindings.
    pub sessions: RwLock<SessionRegistry>,
    /// Live broadcast rooms, one per group.
    pub rooms: RwLock<RoomRegistry>,
    /// Persisted users, groups and messages.
    pub store: Arc<dyn Store>,
    /// Server version string.
    pub version: String,
}

impl GatewayState {
    pub fn new(store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            sessions: RwLock::new(SessionRegistry::new()),
            rooms: RwLock::new(RoomRegistry::new()),
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Register a new client connection.
    pub async fn register_client(&self, client: ConnectedClient) {
        let conn_id = client.conn_id.clone();
        self.clients.write().await.insert(conn_id, client);
    }

    /// Remove a client by conn_id. Returns the removed client if found.
    pub async fn remove_client(&self, conn_id: &str) -> Option<ConnectedClient> {
        self.clients.write().await.remove(conn_id)
    }

    /// Number of connected clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
