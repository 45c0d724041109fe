use axum::{
    Extension,
    extract::{Path, State},
};
use services::error::AppError;
use services::record_ledger::{self, RosterEntry};
use services::stats::{self, GroupRollup, SessionHistoryEntry, SessionSummary, StudentSummary};
use services::{Actor, role_gate, session_manager};
use util::state::AppState;

use super::common::SessionResponse;
use crate::response::{ApiError, ApiResult, ok};
use services::group_settings::find_group;

async fn ensure_history_access(state: &AppState, actor: &Actor, group_id: i64) -> Result<(), ApiError> {
    let group = find_group(state.db(), group_id).await?;
    if !role_gate::can_view_history(actor, &group) {
        return Err(AppError::forbidden("not a member of this group").into());
    }
    Ok(())
}

/// GET /api/groups/{group_id}/attendance/sessions
///
/// Completed sessions with summaries, most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<SessionHistoryEntry>> {
    ensure_history_access(&state, &actor, group_id).await?;
    let history = stats::session_history(state.db(), group_id).await?;
    Ok(ok(history, "Attendance history retrieved"))
}

/// GET /api/groups/{group_id}/attendance/sessions/active
pub async fn get_active_session(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<SessionResponse> {
    ensure_history_access(&state, &actor, group_id).await?;
    let session = session_manager::active_for_group(state.db(), group_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Active session for group {group_id}")))?;
    Ok(ok(SessionResponse::from(session), "Active session retrieved"))
}

/// GET /api/groups/{group_id}/attendance/sessions/{session_id}/summary
pub async fn get_session_summary(
    State(state): State<AppState>,
    Path((group_id, session_id)): Path<(i64, i64)>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<SessionSummary> {
    ensure_history_access(&state, &actor, group_id).await?;
    session_manager::get_in_group(state.db(), group_id, session_id).await?;
    let summary = stats::per_session_summary(state.db(), session_id).await?;
    Ok(ok(summary, "Session summary retrieved"))
}

/// GET /api/groups/{group_id}/attendance/sessions/{session_id}/roster
pub async fn get_roster(
    State(state): State<AppState>,
    Path((group_id, session_id)): Path<(i64, i64)>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<RosterEntry>> {
    ensure_history_access(&state, &actor, group_id).await?;
    session_manager::get_in_group(state.db(), group_id, session_id).await?;
    let roster = record_ledger::roster(state.db(), session_id).await?;
    Ok(ok(roster, "Roster retrieved"))
}

/// GET /api/groups/{group_id}/attendance/students/{student_id}/summary
///
/// Students see only their own summary; the owner sees anyone's.
pub async fn get_student_summary(
    State(state): State<AppState>,
    Path((group_id, student_id)): Path<(i64, i64)>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<StudentSummary> {
    let group = find_group(state.db(), group_id).await?;
    let own = actor.member_id == student_id;
    if !own && !role_gate::can_open_session(&actor, &group) {
        return Err(AppError::forbidden("students can only view their own attendance").into());
    }
    let summary = stats::per_student_summary(state.db(), group_id, student_id).await?;
    Ok(ok(summary, "Student summary retrieved"))
}

/// GET /api/groups/{group_id}/attendance/rollup
pub async fn get_rollup(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<GroupRollup> {
    ensure_history_access(&state, &actor, group_id).await?;
    let rollup = stats::group_rollup(state.db(), group_id).await?;
    Ok(ok(rollup, "Group rollup retrieved"))
}
