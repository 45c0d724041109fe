use api::auth::generate_jwt;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use db::models::group::{self, GroupSettings};
use db::models::group_member::{self, MemberRole};
use db::models::user;
use db::test_utils::setup_test_db;
use serde_json::Value;
use tower::ServiceExt;
use util::{state::AppState, ws::WebSocketManager};

/// A router over a fresh in-memory database.
pub async fn make_test_app() -> (Router, AppState) {
    let db = setup_test_db().await;
    let state = AppState::new(db, WebSocketManager::with_capacity(64));
    (api::app(state.clone()), state)
}

pub struct Profile {
    pub profile_id: i64,
    pub member_id: i64,
    pub token: String,
}

pub struct Seeded {
    pub group: group::Model,
    pub owner: Profile,
    pub students: Vec<Profile>,
    /// A profile with no membership in the group.
    pub outsider_token: String,
}

fn token_for(profile_id: i64) -> String {
    generate_jwt(profile_id).unwrap().0
}

/// One group with an owner and `n` students.
pub async fn seed(state: &AppState, n: usize) -> Seeded {
    let db = state.db();
    let owner = user::Model::create(db, "owner", "owner@test.com").await.unwrap();
    let (group, owner_member) = group::Model::create_with_owner(
        db,
        "COS301",
        owner.id,
        GroupSettings {
            allow_self_attendance: true,
            attendance_window_minutes: 15,
            penalty_threshold: 3,
        },
    )
    .await
    .unwrap();

    let mut students = Vec::new();
    for i in 0..n {
        let u = user::Model::create(db, &format!("student{i}"), &format!("s{i}@test.com"))
            .await
            .unwrap();
        let m = group_member::Model::add(db, group.id, u.id, MemberRole::Student)
            .await
            .unwrap();
        students.push(Profile {
            profile_id: u.id,
            member_id: m.id,
            token: token_for(u.id),
        });
    }

    let outsider = user::Model::create(db, "outsider", "out@test.com").await.unwrap();

    Seeded {
        group,
        owner: Profile {
            profile_id: owner.id,
            member_id: owner_member.id,
            token: token_for(owner.id),
        },
        students,
        outsider_token: token_for(outsider.id),
    }
}

/// Sends a JSON request and returns the status with the parsed body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header("Authorization", format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
