use axum::{
    Router,
    routing::{get, post},
};
use util::state::AppState;

mod common;
mod get;
mod post;

pub use common::SessionResponse;
pub use get::{
    get_active_session, get_rollup, get_roster, get_session_summary, get_student_summary,
    list_sessions,
};
pub use post::{bulk_mark, close_session, mark_self, open_session};

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(open_session))
        .route("/sessions/active", get(get_active_session))
        .route("/sessions/{session_id}/close", post(close_session))
        .route("/sessions/{session_id}/mark", post(mark_self))
        .route("/sessions/{session_id}/records", post(bulk_mark))
        .route("/sessions/{session_id}/summary", get(get_session_summary))
        .route("/sessions/{session_id}/roster", get(get_roster))
        .route("/students/{student_id}/summary", get(get_student_summary))
        .route("/rollup", get(get_rollup))
}
