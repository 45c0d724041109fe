use axum::{
    Extension,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
};
use services::{Actor, notifier};
use std::sync::Arc;
use util::state::AppState;
use util::ws::axum_adapter::ws_route;
use util::ws::serve::WsServerOptions;

use super::ws_handlers::AttendanceWsHandler;

/// GET /ws/attendance/sessions/{session_id}
///
/// Streams the session's `attendance.record_added` / `attendance.session_closed`
/// events to a group member. Presence is tracked per profile.
pub async fn attendance_session_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(session_id): Path<i64>,
) -> impl IntoResponse {
    let handler = Arc::new(AttendanceWsHandler {
        db: app_state.db_clone(),
        session_id,
    });

    ws_route(
        ws,
        &app_state,
        Some(actor.profile_id),
        notifier::topic(session_id),
        handler,
        WsServerOptions::default(),
    )
}
