use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{State, WebSocketUpgrade},
        response::IntoResponse,
        routing::{get, post},
    },
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use {
    huddle_config::HuddleConfig,
    huddle_store::{JsonStore, Store},
};

use crate::{http, state::GatewayState, ws};

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(http::health))
        .route("/login", post(http::login))
        .route("/groups", get(http::list_groups).post(http::create_group))
        .route("/history/{group_id}", get(http::history))
        .route("/ws", get(ws_upgrade_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the gateway HTTP + WebSocket server.
pub async fn start_gateway(config: &HuddleConfig) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(JsonStore::open(config.store.path.as_str()).await?);
    let state = GatewayState::new(store);
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        version = %state.version,
        %addr,
        store = %config.store.path,
        "huddle gateway listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_connection(socket, state))
}
