use crate::models::group::{self, GroupSettings};
use crate::models::{group_member, user};
use migration::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use sea_orm_migration::MigratorTrait;

/// Fresh in-memory database with every migration applied.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Migrated SQLite file at `path` behind a multi-connection pool, for tests
/// that need writers to actually race.
pub async fn setup_file_test_db(path: &Path) -> DatabaseConnection {
    let mut opts = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    opts.max_connections(8).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to open file db");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Self attendance on, 15 minute window, penalty after 3 absences.
pub fn default_settings() -> GroupSettings {
    GroupSettings {
        allow_self_attendance: true,
        attendance_window_minutes: 15,
        penalty_threshold: 3,
    }
}

/// Creates an owner profile and a group it teaches. Returns the group and the
/// owner's teacher membership.
pub async fn seed_group(
    db: &DatabaseConnection,
    name: &str,
) -> (group::Model, group_member::Model) {
    let handle = format!("{}_owner", name.to_lowercase());
    let owner = user::Model::create(db, &handle, &format!("{handle}@test.com"))
        .await
        .expect("Failed to create owner");
    group::Model::create_with_owner(db, name, owner.id, default_settings())
        .await
        .expect("Failed to create group")
}
