pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr, SqlErr};
use std::path::Path;
use util::config;

/// Connects to the configured database.
///
/// `DATABASE_PATH` may be a full DSN or a plain SQLite file path; in the latter
/// case the parent directory is created and the file is opened in `rwc` mode.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let path_or_url = config::database_path();
    let url = if path_or_url.starts_with("sqlite:")
        || path_or_url.starts_with("postgres://")
        || path_or_url.starts_with("mysql://")
    {
        path_or_url
    } else {
        if let Some(parent) = Path::new(&path_or_url).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbErr::Custom(format!("cannot create {}: {e}", parent.display())))?;
        }
        format!("sqlite://{path_or_url}?mode=rwc")
    };

    tracing::info!(url = %url, "connecting to database");
    Database::connect(&url).await
}

/// True when the store rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
