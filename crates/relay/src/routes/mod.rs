//! HTTP routes

pub mod health;
pub mod sessions;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{state::AppState, websocket::ws_handler};

/// Create all routes, nested under the configured path prefix
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness));

    let session_routes = Router::new()
        .route("/sockets-list", get(sessions::list_all))
        .route("/sockets-list/:project_key", get(sessions::list_project))
        .route("/sockets-list/:project_key/:session_id", get(sessions::list_session))
        .route("/sockets-live", get(sessions::live_all))
        .route("/sockets-live/:project_key", get(sessions::live_project))
        .route("/sockets-live/:project_key/:session_id", get(sessions::live_session));

    // WebSocket routes (auth handled in handler via query parameter)
    let websocket_routes = Router::new().route("/socket", get(ws_handler));

    let assist_routes = Router::new()
        .merge(session_routes)
        .merge(websocket_routes);

    let prefix = state.config.path_prefix.clone();
    let router = Router::new().merge(health_routes);
    let router = if prefix.is_empty() {
        router.merge(assist_routes)
    } else {
        router.nest(&prefix, assist_routes)
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
