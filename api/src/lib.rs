pub mod auth;
pub mod response;
pub mod routes;
pub mod ws;

use axum::Router;
use util::state::AppState;

/// The full application: `/api` routes and `/ws` sockets.
pub fn app(app_state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::routes(app_state.clone()))
        .nest("/ws", ws::ws_routes(app_state.clone()))
        .with_state(app_state)
}
