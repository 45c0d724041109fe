use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use services::error::AppError;

/// Standardized API response wrapper for all outgoing JSON responses.
///
/// ```json
/// { "success": true, "data": { ... }, "message": "Session opened" }
/// ```
///
/// Errors carry `success: false`, an empty `data` and a human-readable message.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }
}

/// Serializes as `{}`.
#[derive(Serialize, Default)]
pub struct Empty {}

/// Engine errors on their way out as HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::Conflict(_)
        | AppError::AlreadyMarked { .. }
        | AppError::WindowExpired { .. }
        | AppError::SessionClosed(_) => StatusCode::CONFLICT,
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<Empty>::error(message))).into_response()
    }
}

/// What handlers return: a status plus the wrapped payload, or an [`ApiError`].
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::OK, Json(ApiResponse::success(data, message)))
}

pub fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data, message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[test]
    fn engine_errors_map_to_statuses() {
        assert_eq!(status_for(&AppError::not_found("Session 1")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&AppError::forbidden("no")), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&AppError::AlreadyMarked { session_id: 1, student_id: 2 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&AppError::SessionClosed(1)), StatusCode::CONFLICT);
        assert_eq!(status_for(&AppError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&AppError::Database(sea_orm::DbErr::Custom("boom".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let resp = ApiError(AppError::Database(sea_orm::DbErr::Custom("secret".into()))).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal server error");
        assert_eq!(json["data"], serde_json::json!({}));
    }
}
