use chrono::{DateTime, Utc};
use sea_orm::DbErr;

pub type AppResult<T> = Result<T, AppError>;

/// Everything the attendance engine can refuse or fail with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Another active session, or a concurrent write that lost a uniqueness race.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Student {student_id} is already marked for session {session_id}")]
    AlreadyMarked { session_id: i64, student_id: i64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Self-attendance window expired at {expired_at}")]
    WindowExpired { expired_at: DateTime<Utc> },

    #[error("Session {0} is closed")]
    SessionClosed(i64),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        Self::Forbidden(why.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// `AlreadyMarked` is the duplicate-record flavour of `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::AlreadyMarked { .. })
    }

    /// Whether repeating the same request could succeed later.
    ///
    /// Terminal student-facing states (`WindowExpired`, `AlreadyMarked`,
    /// `SessionClosed`) never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Conflict(_) => true,
            Self::AlreadyMarked { .. }
            | Self::WindowExpired { .. }
            | Self::SessionClosed(_)
            | Self::NotFound(_)
            | Self::Forbidden(_)
            | Self::Validation(_) => false,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let msg = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {msg}")
            })
            .collect();
        fields.sort();
        Self::Validation(fields.join("; "))
    }
}
