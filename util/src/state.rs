//! Application state shared across route handlers and the attendance services.

use crate::ws::WebSocketManager;
use sea_orm::DatabaseConnection;

/// Central application state.
///
/// Holds the SeaORM connection (the transactional store) and the topic-based
/// `WebSocketManager` (the change-notification channel). Both are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    ws: WebSocketManager,
}

impl AppState {
    pub fn new(db: DatabaseConnection, ws: WebSocketManager) -> Self {
        Self { db, ws }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns a shared reference to the internal `WebSocketManager`.
    pub fn ws(&self) -> &WebSocketManager {
        &self.ws
    }

    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }

    pub fn ws_clone(&self) -> WebSocketManager {
        self.ws.clone()
    }
}
