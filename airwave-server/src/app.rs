use crate::room::RoomRegistry;
use crate::signaling::{RelayService, ws_handler};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every relay connection.
pub struct AppState {
    pub relay: RelayService,
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new() -> Self {
        let relay = RelayService::new();
        let registry = RoomRegistry::new(Arc::new(relay.clone()));
        Self { relay, registry }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay router: WebSocket upgrade at `/` and `/ws`, liveness at `/health`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
