//! HTTP route entry point for `/api/...`.
//!
//! - `/health` → health check (public)
//! - `/groups/{group_id}/...` → group settings and attendance (authenticated members)

use crate::auth::guards::allow_authenticated;
use crate::auth::middleware::log_request;
use crate::routes::{groups::groups_routes, health::health_routes};
use axum::{Router, middleware::from_fn};
use util::state::AppState;

pub mod groups;
pub mod health;

pub fn routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/groups",
            groups_routes(app_state.clone()).route_layer(from_fn(allow_authenticated)),
        )
        .layer(from_fn(log_request))
        .with_state(app_state)
}
