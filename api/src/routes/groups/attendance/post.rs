use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use db::models::attendance_record::RecordStatus;
use services::record_ledger::{self, Record};
use services::stats::SessionSummary;
use services::{Actor, session_manager};
use util::state::AppState;

use super::common::{BulkMarkReq, MarkReq, OpenSessionReq, SessionResponse};
use crate::response::{ApiResult, created, ok};

/// POST /api/groups/{group_id}/attendance/sessions
///
/// Body: `{ "type": "manual" | "self" }`. `409` if the group already has an
/// active session.
pub async fn open_session(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<OpenSessionReq>,
) -> ApiResult<SessionResponse> {
    let session = session_manager::open(state.db(), &actor, group_id, body.kind, Utc::now()).await?;
    Ok(created(SessionResponse::from(session), "Attendance session opened"))
}

/// POST /api/groups/{group_id}/attendance/sessions/{session_id}/close
///
/// Idempotent; a completed session returns its existing summary.
pub async fn close_session(
    State(state): State<AppState>,
    Path((group_id, session_id)): Path<(i64, i64)>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<SessionSummary> {
    session_manager::get_in_group(state.db(), group_id, session_id).await?;
    let summary = session_manager::close(&state, &actor, session_id, Utc::now()).await?;
    Ok(ok(summary, "Attendance session closed"))
}

/// POST /api/groups/{group_id}/attendance/sessions/{session_id}/mark
///
/// A student marking themselves. Body `{ "status"?: "present" | "absent" }`,
/// present by default.
pub async fn mark_self(
    State(state): State<AppState>,
    Path((group_id, session_id)): Path<(i64, i64)>,
    Extension(actor): Extension<Actor>,
    body: Option<Json<MarkReq>>,
) -> ApiResult<Record> {
    session_manager::get_in_group(state.db(), group_id, session_id).await?;
    let status = body
        .and_then(|Json(b)| b.status)
        .unwrap_or(RecordStatus::Present);

    let record = record_ledger::submit(
        &state,
        &actor,
        session_id,
        actor.member_id,
        status,
        Utc::now(),
    )
    .await?;
    Ok(created(record, "Attendance recorded"))
}

/// POST /api/groups/{group_id}/attendance/sessions/{session_id}/records
///
/// The owner marking a manual session in one all-or-nothing batch.
pub async fn bulk_mark(
    State(state): State<AppState>,
    Path((group_id, session_id)): Path<(i64, i64)>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<BulkMarkReq>,
) -> ApiResult<Vec<Record>> {
    session_manager::get_in_group(state.db(), group_id, session_id).await?;
    let records =
        record_ledger::bulk_submit(&state, &actor, session_id, &body.entries, Utc::now()).await?;
    Ok(created(records, "Attendance records saved"))
}
