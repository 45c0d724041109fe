use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::TypedHeader;
use headers::UserAgent;
use std::time::Instant;
use tracing::info;

use crate::auth::claims::AuthUser;

/// Logs every request with the caller's profile id (0 when anonymous),
/// the response status and the elapsed time. Preflight `OPTIONS` requests
/// pass through silently.
pub async fn log_request(req: Request<Body>, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let user_id = AuthUser::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|AuthUser(c)| c.sub);
    let user_agent = TypedHeader::<UserAgent>::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|TypedHeader(ua)| ua.to_string());

    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();
    let started = Instant::now();

    let response = next.run(Request::from_parts(parts, body)).await;

    info!(
        method = %method,
        path = %path,
        user = user_id.unwrap_or(0),
        user_agent = user_agent.unwrap_or_else(|| "unknown".into()),
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
