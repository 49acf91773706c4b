//! Gateway: HTTP + WebSocket server, session/room registries, chat and
//! signaling relays.
//!
//! Lifecycle:
//! 1. Load config, open the store
//! 2. Build the router (HTTP endpoints + WS upgrade)
//! 3. Serve; each WS connection runs a read loop that dispatches events
//!    through the relay layer
//!
//! Persistence lives in `huddle-store`, the wire types in
//! `huddle-protocol`; this crate only holds live-connection state.

pub mod broadcast;
pub mod http;
pub mod relay;
pub mod rooms;
pub mod server;
pub mod sessions;
pub mod state;
pub mod ws;
