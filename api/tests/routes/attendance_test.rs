use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::helpers::{Seeded, make_test_app, seed, send};

fn sessions_uri(s: &Seeded) -> String {
    format!("/api/groups/{}/attendance/sessions", s.group.id)
}

async fn open(app: &axum::Router, s: &Seeded, kind: &str) -> i64 {
    let (status, json) = send(
        app,
        "POST",
        &sessions_uri(s),
        Some(&s.owner.token),
        Some(json!({ "type": kind })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn requests_need_a_token_and_membership() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 1).await;

    let (status, _) = send(&app, "GET", &sessions_uri(&s), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", &sessions_uri(&s), Some(&s.outsider_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "GET",
        "/api/groups/9999/attendance/sessions",
        Some(&s.owner.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_one_active_session_and_only_owner_opens() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 1).await;

    let (status, _) = send(
        &app,
        "POST",
        &sessions_uri(&s),
        Some(&s.students[0].token),
        Some(json!({ "type": "manual" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let id = open(&app, &s, "self").await;

    let (status, json) = send(
        &app,
        "POST",
        &sessions_uri(&s),
        Some(&s.owner.token),
        Some(json!({ "type": "manual" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);

    let (status, json) = send(
        &app,
        "GET",
        &format!("{}/active", sessions_uri(&s)),
        Some(&s.students[0].token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], id);
    assert_eq!(json["data"]["type"], "self");
    assert_eq!(json["data"]["status"], "active");
    assert!(json["data"]["expires_at"].is_string());
}

#[tokio::test]
async fn self_marking_flow_through_close() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 2).await;
    let id = open(&app, &s, "self").await;
    let mark = format!("{}/{id}/mark", sessions_uri(&s));

    let (status, json) = send(&app, "POST", &mark, Some(&s.students[0].token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["status"], "present");
    assert_eq!(json["data"]["marked_by"], s.students[0].member_id);

    let (status, _) = send(&app, "POST", &mark, Some(&s.students[0].token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // the owner is not a student
    let (status, _) = send(&app, "POST", &mark, Some(&s.owner.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        "POST",
        &format!("{}/{id}/close", sessions_uri(&s)),
        Some(&s.owner.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let summary = &json["data"];
    assert_eq!(summary["present"], 1);
    assert_eq!(summary["absent"], 1);
    assert_eq!(summary["penalty"], 0);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["percentage"], 50.0);

    let (status, _) = send(&app, "POST", &mark, Some(&s.students[1].token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // closing again is a no-op with the same summary
    let (status, again) = send(
        &app,
        "POST",
        &format!("{}/{id}/close", sessions_uri(&s)),
        Some(&s.owner.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["data"], json["data"]);

    let (status, history) = send(&app, "GET", &sessions_uri(&s), Some(&s.students[1].token), None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id);
    assert_eq!(entries[0]["summary"]["total"], 2);
}

#[tokio::test]
async fn bulk_marking_is_all_or_nothing() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 3).await;
    let id = open(&app, &s, "manual").await;
    let records = format!("{}/{id}/records", sessions_uri(&s));
    let entry = |i: usize, status: &str| json!({ "student_id": s.students[i].member_id, "status": status });

    let (status, json) = send(
        &app,
        "POST",
        &records,
        Some(&s.owner.token),
        Some(json!({ "entries": [entry(0, "present")] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"][0]["marked_by"], s.owner.member_id);

    let (status, _) = send(
        &app,
        "POST",
        &records,
        Some(&s.owner.token),
        Some(json!({ "entries": [entry(1, "present"), entry(0, "absent"), entry(2, "absent")] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &records,
        Some(&s.owner.token),
        Some(json!({ "entries": [entry(1, "penalty")] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &records,
        Some(&s.students[1].token),
        Some(json!({ "entries": [entry(1, "present")] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, roster) = send(
        &app,
        "GET",
        &format!("{}/{id}/roster", sessions_uri(&s)),
        Some(&s.owner.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let marked: Vec<&Value> = roster["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| !e["record"].is_null())
        .collect();
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0]["student_id"], s.students[0].member_id);
}

#[tokio::test]
async fn rollup_and_student_summaries() {
    let (app, state) = make_test_app().await;
    let s = seed(&state, 2).await;

    for present in [vec![0, 1], vec![0]] {
        let id = open(&app, &s, "manual").await;
        let entries: Vec<Value> = present
            .iter()
            .map(|i: &usize| json!({ "student_id": s.students[*i].member_id, "status": "present" }))
            .collect();
        let (status, _) = send(
            &app,
            "POST",
            &format!("{}/{id}/records", sessions_uri(&s)),
            Some(&s.owner.token),
            Some(json!({ "entries": entries })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(
            &app,
            "POST",
            &format!("{}/{id}/close", sessions_uri(&s)),
            Some(&s.owner.token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = send(
        &app,
        "GET",
        &format!("/api/groups/{}/attendance/rollup", s.group.id),
        Some(&s.students[0].token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["sessions"], 2);
    assert_eq!(json["data"]["present"], 3);
    assert_eq!(json["data"]["total"], 4);
    assert_eq!(json["data"]["percentage"], 75.0);

    let own = format!(
        "/api/groups/{}/attendance/students/{}/summary",
        s.group.id, s.students[1].member_id
    );
    let (status, json) = send(&app, "GET", &own, Some(&s.students[1].token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["present"], 1);
    assert_eq!(json["data"]["absent"], 1);
    assert_eq!(json["data"]["current_streak"], 1);

    let (status, _) = send(&app, "GET", &own, Some(&s.students[0].token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", &own, Some(&s.owner.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let unknown = format!(
        "/api/groups/{}/attendance/students/424242/summary",
        s.group.id
    );
    let (status, _) = send(&app, "GET", &unknown, Some(&s.owner.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
