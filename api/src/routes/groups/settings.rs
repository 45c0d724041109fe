use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use services::Actor;
use services::group_settings::{self, SettingsUpdate};
use util::state::AppState;

use crate::response::{ApiResult, ok};

#[derive(Serialize)]
pub struct GroupSettingsResponse {
    pub group_id: i64,
    pub allow_self_attendance: bool,
    pub attendance_window_minutes: i32,
    pub penalty_threshold: i32,
}

/// PUT /api/groups/{group_id}/settings
///
/// Owner only. `attendance_window_minutes` must be 1..=1440 and
/// `penalty_threshold` 1..=100, otherwise `400`.
pub async fn put_settings(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<SettingsUpdate>,
) -> ApiResult<GroupSettingsResponse> {
    let group = group_settings::update_settings(state.db(), &actor, group_id, body).await?;
    Ok(ok(
        GroupSettingsResponse {
            group_id: group.id,
            allow_self_attendance: group.allow_self_attendance,
            attendance_window_minutes: group.attendance_window_minutes,
            penalty_threshold: group.penalty_threshold,
        },
        "Group settings updated",
    ))
}
