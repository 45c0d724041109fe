use axum::http::StatusCode;
use serde_json::json;

use crate::helpers::{make_test_app, seed, send};

#[tokio::test]
async fn owner_updates_settings_within_range() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 1).await;
    let uri = format!("/api/groups/{}/settings", s.group.id);

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&s.owner.token),
        Some(json!({
            "allow_self_attendance": false,
            "attendance_window_minutes": 20,
            "penalty_threshold": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["attendance_window_minutes"], 20);
    assert_eq!(json["data"]["allow_self_attendance"], false);

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&s.owner.token),
        Some(json!({
            "allow_self_attendance": true,
            "attendance_window_minutes": 0,
            "penalty_threshold": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn students_cannot_change_settings() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 1).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/groups/{}/settings", s.group.id),
        Some(&s.students[0].token),
        Some(json!({
            "allow_self_attendance": true,
            "attendance_window_minutes": 10,
            "penalty_threshold": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
