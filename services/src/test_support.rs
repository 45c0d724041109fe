use chrono::{DateTime, SubsecRound, Utc};
use db::models::group::{self, GroupSettings};
use db::models::group_member::{self, MemberRole};
use db::models::user;
use db::test_utils::{setup_file_test_db, setup_test_db};
use sea_orm::DatabaseConnection;
use tempfile::TempDir;
use util::state::AppState;
use util::ws::WebSocketManager;

use crate::actor::Actor;

pub struct Classroom {
    pub state: AppState,
    pub group: group::Model,
    pub teacher: Actor,
    pub students: Vec<Actor>,
}

/// A fresh database with one self-attendance group, its owner and `n` students.
pub async fn classroom(n: usize, window_minutes: i32, threshold: i32) -> Classroom {
    classroom_in(setup_test_db().await, n, window_minutes, threshold).await
}

/// Like [`classroom`] but on a pooled SQLite file. Keep the `TempDir` alive
/// for the duration of the test.
pub async fn file_classroom(n: usize) -> (Classroom, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_test_db(&dir.path().join("attendance.db")).await;
    (classroom_in(db, n, 15, 3).await, dir)
}

async fn classroom_in(
    db: DatabaseConnection,
    n: usize,
    window_minutes: i32,
    threshold: i32,
) -> Classroom {
    let owner = user::Model::create(&db, "owner", "owner@test.com").await.unwrap();
    let (group, teacher) = group::Model::create_with_owner(
        &db,
        "COS301",
        owner.id,
        GroupSettings {
            allow_self_attendance: true,
            attendance_window_minutes: window_minutes,
            penalty_threshold: threshold,
        },
    )
    .await
    .unwrap();

    let mut students = Vec::with_capacity(n);
    for i in 0..n {
        let profile = user::Model::create(&db, &format!("student{i}"), &format!("s{i}@test.com"))
            .await
            .unwrap();
        let member = group_member::Model::add(&db, group.id, profile.id, MemberRole::Student)
            .await
            .unwrap();
        students.push(Actor::from(&member));
    }

    Classroom {
        state: AppState::new(db, WebSocketManager::with_capacity(64)),
        group,
        teacher: Actor::from(&teacher),
        students,
    }
}

/// Current time at whole-second precision, so stored timestamps compare equal.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
