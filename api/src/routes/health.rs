use crate::response::ApiResponse;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use util::{config, state::AppState};

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: String,
}

/// GET /health
///
/// ```json
/// { "success": true, "data": { "status": "OK", "service": "attendance" }, "message": "Health check passed" }
/// ```
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success(
        Health {
            status: "OK",
            service: config::project_name(),
        },
        "Health check passed",
    ))
}

#[cfg(test)]
mod tests {
    use super::health_check;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;
    use serde_json::Value;

    #[tokio::test]
    async fn health_check_reports_ok() {
        let response = health_check().await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "OK");
        assert_eq!(json["message"], "Health check passed");
    }
}
