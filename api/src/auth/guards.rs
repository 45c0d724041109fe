//! Route guards: authentication and group membership.
//!
//! Fine-grained decisions (owner-only, self-mark rules) belong to the role
//! gate in `services`; these guards only establish who the caller is and
//! which membership they act through.

use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use services::Actor;
use services::error::AppError;
use services::group_settings::find_group;
use services::session_manager;
use std::collections::HashMap;
use util::state::AppState;

use crate::auth::claims::AuthUser;
use crate::response::{ApiError, ApiResponse, Empty};

fn deny(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::<Empty>::error(message))).into_response()
}

fn id_param(params: &HashMap<String, String>, name: &str) -> Option<i64> {
    params.get(name).and_then(|v| v.parse().ok())
}

/// Checks the bearer token and stashes the `AuthUser` in request extensions.
pub async fn allow_authenticated(req: Request<Body>, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let user = match AuthUser::from_request_parts(&mut parts, &()).await {
        Ok(user) => user,
        Err(_) => return deny(StatusCode::UNAUTHORIZED, "Authentication required"),
    };

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user);
    next.run(req).await
}

async fn resolve_actor(state: &AppState, group_id: i64, profile_id: i64) -> Result<Actor, Response> {
    find_group(state.db(), group_id)
        .await
        .map_err(|e| ApiError(e).into_response())?;

    match Actor::resolve(state.db(), group_id, profile_id).await {
        Ok(actor) => Ok(actor),
        Err(AppError::NotFound(_)) => Err(deny(
            StatusCode::FORBIDDEN,
            "You are not a member of this group",
        )),
        Err(e) => Err(ApiError(e).into_response()),
    }
}

/// Resolves the caller's membership in `{group_id}` and inserts it as an
/// `Actor` extension. `404` for an unknown group, `403` for non-members.
pub async fn require_group_member(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    AuthUser(claims): AuthUser,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(group_id) = id_param(&params, "group_id") else {
        return deny(StatusCode::BAD_REQUEST, "Invalid group id");
    };

    match resolve_actor(&state, group_id, claims.sub).await {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

/// For `/ws/attendance/sessions/{session_id}`: the caller must be a member of
/// the session's group.
pub async fn allow_attendance_ws_access(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    AuthUser(claims): AuthUser,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(session_id) = id_param(&params, "session_id") else {
        return deny(StatusCode::BAD_REQUEST, "Invalid session id");
    };
    let session = match session_manager::get(state.db(), session_id).await {
        Ok(s) => s,
        Err(e) => return ApiError(e).into_response(),
    };

    match resolve_actor(&state, session.group_id, claims.sub).await {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}
