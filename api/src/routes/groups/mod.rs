use axum::{Router, middleware::from_fn_with_state, routing::put};
use util::state::AppState;

use crate::auth::guards::require_group_member;

pub mod attendance;
pub mod settings;

use attendance::attendance_routes;
use settings::put_settings;

/// Everything under `/groups/{group_id}`; handlers receive the caller's
/// membership as an `Actor` extension.
pub fn groups_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/{group_id}/settings", put(put_settings))
        .nest("/{group_id}/attendance", attendance_routes())
        .route_layer(from_fn_with_state(app_state, require_group_member))
}
